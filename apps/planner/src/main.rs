mod config;
mod errors;
mod planning;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars or an invalid policy)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting study planner v{}", env!("CARGO_PKG_VERSION"));
    info!(
        per_elem_exposures = config.policy.per_elem_exposures,
        min_active_per_row = config.policy.min_active_per_row,
        safety_rows = config.policy.safety_rows,
        absence_ratio = config.policy.absence_ratio,
        t_ratio = config.policy.t_ratio,
        capacity_slack = config.policy.capacity_slack,
        grid_row_cap = config.grid_row_cap,
        "Planner policy loaded"
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let app = build_router(AppState::new(config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
