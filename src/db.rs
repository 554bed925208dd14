use std::{io, path::Path, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    Connection, PgPool,
};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::{config::DatabaseConfig, error::ConnectionError};

/// Anything that can answer "is the store reachable right now".
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, timeout: Duration) -> Result<(), ConnectionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

type InitOutcome = Result<PgPool, Arc<ConnectionError>>;

/// Owns the process-wide Postgres pool. Built once in `main` and handed down.
pub struct Database {
    config: DatabaseConfig,
    pool: OnceCell<InitOutcome>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Wraps an already connected pool, e.g. one provided by `#[sqlx::test]`.
    pub fn from_pool(config: DatabaseConfig, pool: PgPool) -> Self {
        Self {
            config,
            pool: OnceCell::new_with(Some(Ok(pool))),
        }
    }

    /// Opens the pool, applies migrations and pings the store.
    ///
    /// Runs at most once: concurrent callers wait for the first one and all
    /// of them observe its outcome, including a failure.
    pub async fn init(&self) -> Result<&PgPool, Arc<ConnectionError>> {
        self.pool
            .get_or_init(|| async { self.connect().await.map_err(Arc::new) })
            .await
            .as_ref()
            .map_err(Arc::clone)
    }

    pub fn pool(&self) -> Result<&PgPool, ConnectionError> {
        match self.pool.get() {
            Some(Ok(pool)) => Ok(pool),
            _ => Err(ConnectionError::NotInitialized),
        }
    }

    pub fn stats(&self) -> Option<PoolStats> {
        self.pool().ok().map(|p| PoolStats {
            size: p.size(),
            idle: p.num_idle(),
        })
    }

    /// Releases every pooled connection. No-op when `init` never succeeded.
    pub async fn close(&self) {
        if let Ok(pool) = self.pool() {
            info!("closing PostgreSQL connection pool");
            pool.close().await;
        }
    }

    fn connect_options(&self) -> Result<PgConnectOptions, ConnectionError> {
        let cfg = &self.config;
        if let Some(url) = &cfg.url {
            return PgConnectOptions::from_str(url).map_err(ConnectionError::Connect);
        }
        let ssl_mode = PgSslMode::from_str(&cfg.ssl_mode)
            .map_err(|_| ConnectionError::InvalidSslMode(cfg.ssl_mode.clone()))?;
        Ok(PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.name)
            .ssl_mode(ssl_mode))
    }

    fn pool_options(&self) -> PgPoolOptions {
        let cfg = &self.config;
        let max = cfg.max_open_conns.max(1);
        PgPoolOptions::new()
            .max_connections(max)
            // floor kept warm; idle_timeout reaps anything above it
            .min_connections(cfg.min_idle_conns.min(max))
            .max_lifetime(cfg.conn_max_lifetime)
            .idle_timeout(cfg.conn_max_idle_time)
            .acquire_timeout(cfg.ping_timeout)
    }

    async fn connect(&self) -> Result<PgPool, ConnectionError> {
        let options = self.connect_options()?;
        let pool = self
            .pool_options()
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to open database connection");
                ConnectionError::Connect(e)
            })?;

        if let Err(e) = run_migrations(&pool, Path::new(&self.config.migrations_dir)).await {
            error!(error = %e, "migration failed");
            pool.close().await;
            return Err(e);
        }

        if let Err(e) = ping(&pool, self.config.ping_timeout).await {
            error!(error = %e, "failed to ping database");
            pool.close().await;
            return Err(e);
        }

        info!(
            host = %self.config.host,
            database = %self.config.name,
            "connected to PostgreSQL"
        );
        Ok(pool)
    }
}

#[async_trait]
impl LivenessProbe for Database {
    async fn probe(&self, timeout: Duration) -> Result<(), ConnectionError> {
        let pool = self.pool()?;
        ping(pool, timeout).await
    }
}

async fn ping(pool: &PgPool, timeout: Duration) -> Result<(), ConnectionError> {
    let round_trip = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    };
    match tokio::time::timeout(timeout, round_trip).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Ping(e)),
        Err(_) => Err(ConnectionError::PingTimeout(timeout)),
    }
}

/// Counts migration files in `dir`. `None` when the directory does not exist.
fn migration_files(dir: &Path) -> Result<Option<usize>, ConnectionError> {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut count = 0;
            for entry in entries {
                let entry = entry.map_err(|source| ConnectionError::ReadMigrations {
                    dir: dir.display().to_string(),
                    source,
                })?;
                if entry.path().extension().is_some_and(|ext| ext == "sql") {
                    count += 1;
                }
            }
            Ok(Some(count))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConnectionError::ReadMigrations {
            dir: dir.display().to_string(),
            source,
        }),
    }
}

/// Applies pending migrations from `dir`. A missing or empty directory is skipped.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<(), ConnectionError> {
    match migration_files(dir)? {
        None => {
            warn!(dir = %dir.display(), "migration directory does not exist; skipping");
            return Ok(());
        }
        Some(0) => {
            warn!(dir = %dir.display(), "no migration files found; skipping");
            return Ok(());
        }
        Some(n) => info!(dir = %dir.display(), files = n, "applying migrations"),
    }

    let migrator = Migrator::new(dir).await?;
    migrator.run(pool).await?;
    Ok(())
}
