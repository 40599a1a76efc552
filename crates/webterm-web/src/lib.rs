//! HTTP/WebSocket front for the terminal relay.
//!
//! Serves the terminal endpoint a browser connects to, authenticates the
//! caller, resolves the requested host through the file-backed inventory and
//! hands the socket to the relay core.

pub mod auth;
pub mod config;
pub mod error;
pub mod inventory;
pub mod ws;

use std::sync::Arc;

use anyhow::Context;

use crate::auth::StaticTokenValidator;
use crate::config::ServerConfig;
use crate::inventory::FileInventory;

/// Load the inventory and serve until the process is stopped.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let inventory = FileInventory::load(&config.inventory)
        .with_context(|| format!("loading inventory from {}", config.inventory.display()))?;
    tracing::info!(hosts = inventory.len(), "inventory loaded");
    if config.tokens.is_empty() {
        tracing::warn!("no access tokens configured; every terminal request will be rejected");
    }

    let state = ws::AppState::new(
        Arc::new(inventory),
        Arc::new(StaticTokenValidator::new(config.tokens.clone())),
        config.control_channel,
        Arc::new(config.session_options()),
    );
    let router = ws::router(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, mode = ?config.control_channel, "terminal relay listening");
    axum::serve(listener, router).await?;

    Ok(())
}
