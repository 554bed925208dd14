use std::time::Duration;

use thiserror::Error;

/// A required or malformed environment value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {key} is not set")]
    Missing { key: String },

    #[error("environment variable {key}={value:?} is invalid: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failures of the connection manager: pool setup, migrations and liveness.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("database connection is not initialized")]
    NotInitialized,

    #[error("invalid ssl mode {0:?}")]
    InvalidSslMode(String),

    #[error("failed to open database connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to read migration directory {dir}: {source}")]
    ReadMigrations {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("database ping failed: {0}")]
    Ping(#[source] sqlx::Error),

    #[error("database ping timed out after {0:?}")]
    PingTimeout(Duration),
}

/// Repository failures. `NotFound` is the only variant callers branch on.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} not found ({key})")]
    NotFound { entity: &'static str, key: String },

    #[error("failed to {op}: {source}")]
    Persistence {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to {op}: timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
}

impl RepoError {
    pub fn user_not_found(key: impl Into<String>) -> Self {
        RepoError::NotFound {
            entity: "user",
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. })
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Rejected request payload.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = RepoError::user_not_found("id=7");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "user not found (id=7)");

        let err = RepoError::Timeout {
            op: "list users",
            after: Duration::from_secs(1),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("failed to list users"));
    }

    #[test]
    fn persistence_keeps_the_cause() {
        let err = RepoError::Persistence {
            op: "create user",
            source: sqlx::Error::RowNotFound,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("create user"));
    }

    #[test]
    fn config_error_names_the_key() {
        let err = ConfigError::Missing { key: "DB_HOST".into() };
        assert_eq!(
            err.to_string(),
            "required environment variable DB_HOST is not set"
        );
    }
}
