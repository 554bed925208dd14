use ewallet_ums::{
    app,
    config::{AppConfig, Env, LogConfig},
    logging::init_tracing,
    state::AppState,
};
use tracing::{error, info};

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::init(config).await?;
    if let Some(stats) = state.db.stats() {
        info!(size = stats.size, idle = stats.idle, "database initialized");
    }

    let app = app::build_app(state.clone());
    let served = app::serve(app, &state.config.server).await;

    state.db.close().await;
    served
}

#[tokio::main]
async fn main() {
    let env = Env::setup();

    let config = match AppConfig::from_env(env) {
        Ok(c) => c,
        Err(e) => {
            init_tracing(&LogConfig::from_env(env));
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    init_tracing(&config.log);
    info!(environment = %config.log.environment, "configuration loaded");

    if let Err(e) = run(config).await {
        error!(error = ?e, "fatal error");
        std::process::exit(1);
    }
}
