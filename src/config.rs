use std::{collections::HashMap, str::FromStr, sync::OnceLock, time::Duration};

use tracing::debug;

use crate::error::ConfigError;

static ENV: OnceLock<Env> = OnceLock::new();

/// Snapshot of the process environment, taken once and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    /// Loads `.env` (if any) and the process environment exactly once.
    pub fn setup() -> &'static Env {
        ENV.get_or_init(|| {
            if let Err(e) = dotenvy::dotenv() {
                debug!(error = %e, "no .env file loaded, using process environment");
            }
            Env::from_process()
        })
    }

    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match self.vars.get(key) {
            Some(v) if !v.is_empty() => Some(v.clone()),
            _ => std::env::var(key).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_opt(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.lookup(key).ok_or_else(|| {
            tracing::error!(key, "required environment variable is not set");
            ConfigError::Missing { key: key.into() }
        })
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.lookup(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.into(),
                reason: e.to_string(),
                value: raw,
            }),
        }
    }

    fn secs_or(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or::<u64>(key, default).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_open_conns: u32,
    pub min_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
    pub ping_timeout: Duration,
    pub statement_timeout: Duration,
    pub migrations_dir: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub environment: String,
    pub json: bool,
}

impl LogConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            environment: env.get("ENVIRONMENT", "development"),
            json: env
                .get_opt("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env(env: &Env) -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: env.get("HOST", "0.0.0.0"),
            port: env.parse_or("PORT", 8080)?,
            request_timeout: env.secs_or("REQUEST_TIMEOUT_SECS", 60)?,
            shutdown_timeout: env.secs_or("SHUTDOWN_TIMEOUT_SECS", 30)?,
        };

        let database = DatabaseConfig {
            url: env.get_opt("DATABASE_URL"),
            host: env.get("DB_HOST", "localhost"),
            port: env.parse_or("DB_PORT", 5432)?,
            user: env.get("DB_USER", "postgres"),
            password: env.get("DB_PASSWORD", "postgres"),
            name: env.get("DB_NAME", "ewallet_ums"),
            ssl_mode: env.get("DB_SSL_MODE", "disable"),
            max_open_conns: env.parse_or("DB_MAX_OPEN_CONNS", 25)?,
            min_idle_conns: env.parse_or("DB_MIN_IDLE_CONNS", 0)?,
            conn_max_lifetime: env.secs_or("DB_CONN_MAX_LIFETIME_SECS", 300)?,
            conn_max_idle_time: env.secs_or("DB_CONN_MAX_IDLE_TIME_SECS", 60)?,
            ping_timeout: env.secs_or("DB_PING_TIMEOUT_SECS", 5)?,
            statement_timeout: env.secs_or("DB_STATEMENT_TIMEOUT_SECS", 30)?,
            migrations_dir: env.get("DB_MIGRATIONS_DIR", "migrations"),
        };

        Ok(Self {
            server,
            database,
            log: LogConfig::from_env(env),
        })
    }
}
