mod agent;
mod chat;
mod core;
mod embedding;
mod models;
mod retrieval;
mod server;
mod session;
mod state;
mod store;

use std::path::Path;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use crate::core::config::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    core::logging::init(Path::new(&settings.log_dir));

    let state = AppState::initialize(settings).await;

    let bind_addr = format!("{}:{}", state.settings.host, state.settings.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
