pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod mail;
pub mod state;
pub mod storage;
pub mod token;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use config::Config;
use mail::Mailer;
use state::AppState;

pub async fn run() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("BLOGD_LOG"))
        .init();

    let config = Config::from_env();
    let mailer = Mailer::from_config(&config);

    let app = AppState::new(storage::init_db_from_env().await, mailer, config);

    api::run_server(app).await
}
