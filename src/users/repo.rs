use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{error, info};

use super::{
    query::{count_sql, into_arguments, list_sql, USER_COLUMNS},
    repo_types::{User, UserFilter},
};
use crate::error::{RepoError, RepoResult};

/// Persistence for [`User`]. Soft-deleted rows are invisible to every method.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts `user`, then fills in its id and timestamps from the store.
    async fn create(&self, user: &mut User) -> RepoResult<()>;

    async fn get_by_id(&self, id: i64) -> RepoResult<User>;

    async fn get_by_email(&self, email: &str) -> RepoResult<User>;

    async fn get_by_phone(&self, phone: &str) -> RepoResult<User>;

    /// Overwrites email, phone, full name and both flags; refreshes `updated_at`.
    async fn update(&self, user: &mut User) -> RepoResult<()>;

    /// Soft delete. A second call on the same id is `NotFound`.
    async fn delete(&self, id: i64) -> RepoResult<()>;

    /// Matching users, newest first, paginated by the filter.
    async fn list(&self, filter: &UserFilter) -> RepoResult<Vec<User>>;

    /// Number of users matching the filter's predicates.
    async fn count(&self, filter: &UserFilter) -> RepoResult<i64>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Bounds one statement by the repository timeout. Dropping the query
    /// future on expiry cancels the round-trip and returns the connection.
    async fn run<T, F>(&self, op: &'static str, fut: F) -> RepoResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(source)) => Err(RepoError::Persistence { op, source }),
            Err(_) => Err(RepoError::Timeout {
                op,
                after: self.timeout,
            }),
        }
    }

    async fn get_by(&self, column: &'static str, key: String, value: Key<'_>) -> RepoResult<User> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND deleted_at IS NULL");
        let query = sqlx::query_as::<_, User>(&sql);
        let query = match value {
            Key::Id(id) => query.bind(id),
            Key::Str(s) => query.bind(s),
        };
        let row = self
            .run("get user", query.fetch_optional(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, %column, %key, "get user failed"))?;
        row.ok_or_else(|| RepoError::user_not_found(key))
    }
}

enum Key<'a> {
    Id(i64),
    Str(&'a str),
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &mut User) -> RepoResult<()> {
        let query = sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime)>(
            r#"
            INSERT INTO users (email, phone, full_name, password_hash, is_active, is_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_verified);

        let (id, created_at, updated_at) = self
            .run("create user", query.fetch_one(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, email = %user.email, "create user failed"))?;

        user.id = id;
        user.created_at = created_at;
        user.updated_at = updated_at;
        user.deleted_at = None;
        info!(user_id = id, "user created");
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<User> {
        self.get_by("id", format!("id={id}"), Key::Id(id)).await
    }

    async fn get_by_email(&self, email: &str) -> RepoResult<User> {
        self.get_by("email", format!("email={email}"), Key::Str(email))
            .await
    }

    async fn get_by_phone(&self, phone: &str) -> RepoResult<User> {
        self.get_by("phone", format!("phone={phone}"), Key::Str(phone))
            .await
    }

    async fn update(&self, user: &mut User) -> RepoResult<()> {
        let query = sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            UPDATE users
            SET email = $1, phone = $2, full_name = $3, is_active = $4, is_verified = $5,
                updated_at = NOW()
            WHERE id = $6 AND deleted_at IS NULL
            RETURNING updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.id);

        let updated_at = self
            .run("update user", query.fetch_optional(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, user_id = user.id, "update user failed"))?
            .ok_or_else(|| RepoError::user_not_found(format!("id={}", user.id)))?;

        user.updated_at = updated_at;
        info!(user_id = user.id, "user updated");
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id);

        let done = self
            .run("delete user", query.execute(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, user_id = id, "delete user failed"))?;

        if done.rows_affected() == 0 {
            return Err(RepoError::user_not_found(format!("id={id}")));
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }

    async fn list(&self, filter: &UserFilter) -> RepoResult<Vec<User>> {
        let (sql, params) = list_sql(filter);
        let query = sqlx::query_as_with::<_, User, _>(&sql, into_arguments(params));
        let users = self
            .run("list users", query.fetch_all(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, ?filter, "list users failed"))?;
        Ok(users)
    }

    async fn count(&self, filter: &UserFilter) -> RepoResult<i64> {
        let (sql, params) = count_sql(filter);
        let query = sqlx::query_scalar_with::<_, i64, _>(&sql, into_arguments(params));
        let total = self
            .run("count users", query.fetch_one(&self.db))
            .await
            .inspect_err(|e| error!(error = %e, ?filter, "count users failed"))?;
        Ok(total)
    }
}
