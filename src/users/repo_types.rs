use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub phone: String,
    pub full_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // write-only, never leaves the service
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deleted_at: Option<OffsetDateTime>,
}

impl User {
    /// A record not yet stored: id and timestamps are assigned by `create`.
    pub fn new(
        email: impl Into<String>,
        phone: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            email: email.into(),
            phone: phone.into(),
            full_name: full_name.into(),
            password_hash: password_hash.into(),
            is_active: true,
            is_verified: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            deleted_at: None,
        }
    }
}

/// Criteria for `list` / `count`. Every field is optional; the default
/// filter matches all users that are not soft-deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    /// 0 means no offset.
    #[serde(default)]
    pub offset: i64,
    /// 0 means no limit.
    #[serde(default)]
    pub limit: i64,
}

impl UserFilter {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.is_verified = Some(verified);
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Same predicates, no pagination.
    pub fn unpaged(&self) -> Self {
        Self {
            limit: 0,
            offset: 0,
            ..self.clone()
        }
    }
}
