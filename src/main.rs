mod api;
mod app;
mod auth;
mod config;
mod db;
mod state;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gametime=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env.local is loaded first so its values win; dotenvy never overrides.
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::from_env()?;
    let db = db::connect(&config).await?;

    if std::env::args().nth(1).as_deref() == Some("migrate") {
        db::run_migrations(&db).await?;
        return Ok(());
    }

    db::run_migrations(&db).await?;

    let state = AppState::new(db, config);
    let config = state.config.clone();
    let app = app::build_app(state);
    app::serve(app, &config).await
}
