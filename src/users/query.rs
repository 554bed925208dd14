//! SQL construction for `list` / `count`.
//!
//! Both statements are produced from the same [`UserQuery`], so they always
//! agree on which rows a filter matches. Values are only ever bound as
//! positional parameters; the SQL text contains column names and `$n`
//! placeholders, nothing caller-supplied.

use sqlx::{postgres::PgArguments, Arguments};

use super::repo_types::UserFilter;

pub(crate) const USER_COLUMNS: &str = "id, email, phone, full_name, password_hash, is_active, \
     is_verified, created_at, updated_at, deleted_at";

const NOT_DELETED: &str = "deleted_at IS NULL";

/// A value bound to one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Param {
    Text(String),
    Bool(bool),
    Int(i64),
}

impl Param {
    fn add_to(self, args: &mut PgArguments) {
        match self {
            Param::Text(v) => args.add(v),
            Param::Bool(v) => args.add(v),
            Param::Int(v) => args.add(v),
        }
    }
}

/// Predicates appended after the soft-delete guard, plus their parameters.
/// Each pushed value takes the next placeholder number.
#[derive(Debug, Default)]
pub(crate) struct UserQuery {
    conditions: Vec<String>,
    params: Vec<Param>,
}

impl UserQuery {
    pub(crate) fn from_filter(filter: &UserFilter) -> Self {
        let mut q = Self::default();
        if let Some(email) = &filter.email {
            q.eq("email", Param::Text(email.clone()));
        }
        if let Some(phone) = &filter.phone {
            q.eq("phone", Param::Text(phone.clone()));
        }
        if let Some(active) = filter.is_active {
            q.eq("is_active", Param::Bool(active));
        }
        if let Some(verified) = filter.is_verified {
            q.eq("is_verified", Param::Bool(verified));
        }
        q
    }

    fn bind(&mut self, value: Param) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn eq(&mut self, column: &'static str, value: Param) {
        let placeholder = self.bind(value);
        self.conditions.push(format!("{column} = {placeholder}"));
    }

    fn where_clause(&self) -> String {
        let mut clause = format!(" WHERE {NOT_DELETED}");
        if !self.conditions.is_empty() {
            clause.push_str(" AND ");
            clause.push_str(&self.conditions.join(" AND "));
        }
        clause
    }

    /// `SELECT` for one page, newest first.
    pub(crate) fn list(mut self, filter: &UserFilter) -> (String, Vec<Param>) {
        let mut sql = format!("SELECT {USER_COLUMNS} FROM users{}", self.where_clause());
        sql.push_str(" ORDER BY created_at DESC");
        if filter.limit > 0 {
            let p = self.bind(Param::Int(filter.limit));
            sql.push_str(&format!(" LIMIT {p}"));
        }
        if filter.offset > 0 {
            let p = self.bind(Param::Int(filter.offset));
            sql.push_str(&format!(" OFFSET {p}"));
        }
        (sql, self.params)
    }

    /// `SELECT COUNT(*)` over the same predicates; pagination is ignored.
    pub(crate) fn count(self) -> (String, Vec<Param>) {
        let sql = format!("SELECT COUNT(*) FROM users{}", self.where_clause());
        (sql, self.params)
    }
}

pub(crate) fn into_arguments(params: Vec<Param>) -> PgArguments {
    let mut args = PgArguments::default();
    for p in params {
        p.add_to(&mut args);
    }
    args
}

pub(crate) fn list_sql(filter: &UserFilter) -> (String, Vec<Param>) {
    UserQuery::from_filter(filter).list(filter)
}

pub(crate) fn count_sql(filter: &UserFilter) -> (String, Vec<Param>) {
    UserQuery::from_filter(filter).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Param {
        Param::Text(s.to_string())
    }

    fn tail(sql: &str) -> &str {
        sql.split_once(" FROM users").map(|(_, t)| t).unwrap()
    }

    #[test]
    fn empty_filter_only_hides_deleted() {
        let f = UserFilter::default();
        let (sql, params) = list_sql(&f);
        assert!(sql.starts_with("SELECT id, email, phone, full_name"));
        assert_eq!(tail(&sql), " WHERE deleted_at IS NULL ORDER BY created_at DESC");
        assert!(params.is_empty());

        let (sql, params) = count_sql(&f);
        assert_eq!(sql, "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn all_predicates_in_fixed_order() {
        let f = UserFilter::default()
            .verified(true)
            .active(false)
            .phone("+62811")
            .email("a@b.io");
        let (sql, params) = list_sql(&f);
        assert_eq!(
            tail(&sql),
            " WHERE deleted_at IS NULL AND email = $1 AND phone = $2 AND is_active = $3 \
             AND is_verified = $4 ORDER BY created_at DESC"
        );
        assert_eq!(
            params,
            vec![text("a@b.io"), text("+62811"), Param::Bool(false), Param::Bool(true)]
        );
    }

    #[test]
    fn placeholders_skip_unset_fields() {
        let f = UserFilter::default().phone("+62811").verified(false).page(10, 0);
        let (sql, params) = list_sql(&f);
        assert_eq!(
            tail(&sql),
            " WHERE deleted_at IS NULL AND phone = $1 AND is_verified = $2 \
             ORDER BY created_at DESC LIMIT $3"
        );
        assert_eq!(params, vec![text("+62811"), Param::Bool(false), Param::Int(10)]);
    }

    #[test]
    fn offset_without_limit_takes_next_slot() {
        let f = UserFilter::default().active(true).page(0, 40);
        let (sql, params) = list_sql(&f);
        assert_eq!(
            tail(&sql),
            " WHERE deleted_at IS NULL AND is_active = $1 ORDER BY created_at DESC OFFSET $2"
        );
        assert_eq!(params, vec![Param::Bool(true), Param::Int(40)]);
    }

    #[test]
    fn limit_and_offset_follow_predicates() {
        let f = UserFilter::default().email("x@y.z").page(5, 15);
        let (sql, params) = list_sql(&f);
        assert!(sql.ends_with("email = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"));
        assert_eq!(params, vec![text("x@y.z"), Param::Int(5), Param::Int(15)]);
    }

    #[test]
    fn negative_pagination_is_ignored() {
        let f = UserFilter::default().page(-1, -5);
        let (sql, params) = list_sql(&f);
        assert!(sql.ends_with("ORDER BY created_at DESC"));
        assert!(params.is_empty());
    }

    #[test]
    fn count_matches_list_predicates_and_drops_paging() {
        let f = UserFilter::default().email("a@b.io").active(true).page(3, 9);
        let (list, list_params) = list_sql(&f);
        let (count, count_params) = count_sql(&f);

        let list_where = tail(&list).split(" ORDER BY").next().unwrap();
        assert_eq!(tail(&count), list_where);
        assert_eq!(count_params, list_params[..2].to_vec());
        assert!(!count.contains("LIMIT"));
        assert!(!count.contains("OFFSET"));
    }

    #[test]
    fn values_never_reach_the_sql_text() {
        let hostile = "x' OR '1'='1";
        let f = UserFilter::default().email(hostile).phone("'; DROP TABLE users; --");
        let (sql, params) = list_sql(&f);
        assert!(!sql.contains(hostile));
        assert!(!sql.contains("DROP"));
        assert_eq!(params[0], text(hostile));
    }

    #[test]
    fn empty_string_is_a_real_predicate() {
        let f = UserFilter::default().email("");
        let (sql, params) = count_sql(&f);
        assert!(sql.ends_with("AND email = $1"));
        assert_eq!(params, vec![text("")]);
    }
}
