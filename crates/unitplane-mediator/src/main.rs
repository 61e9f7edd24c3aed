//! Unitplane Mediator - Storage RPC Service
//!
//! This is the main entry point for the mediator service. It owns the
//! database and serves the mediator interface to remote workers.
//!
//! # HTTP Endpoints
//!
//! - `POST /rpc` - Mediator RPC
//! - `GET /health` - Health check
//! - `GET /ready` - Readiness check

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unitplane_mediator::{create_router, AppState, LocalMediator};
use unitplane_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,unitplane=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Unitplane Mediator");

    // Load configuration from environment
    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".to_string());
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data".to_string());

    // Initialize store
    let store = Arc::new(RocksStore::open(&data_dir)?);
    tracing::info!(data_dir = %data_dir, "Initialized RocksDB store");

    // Serve the local mediator over RPC
    let state = AppState::new(Arc::new(LocalMediator::new(store)));
    let app = create_router(state);

    // Start server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
