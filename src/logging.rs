use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

fn default_filter(cfg: &LogConfig) -> &'static str {
    if cfg.is_production() {
        "ewallet_ums=info,tower_http=info,sqlx=warn"
    } else {
        "ewallet_ums=debug,axum=info,tower_http=debug,sqlx=info"
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the environment default;
/// production (or `LOG_FORMAT=json`) logs JSON.
pub fn init_tracing(cfg: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cfg)));

    let result = if cfg.is_production() || cfg.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
