//! Unitplane Agent - Unit Lifecycle Worker
//!
//! This is the main entry point for the agent service. It runs the worker
//! for one host and accepts commands over RPC.
//!
//! # HTTP Endpoints
//!
//! - `POST /rpc` - Worker RPC (`create_unit`, `*_unit` casts)
//! - `GET /health` - Health check

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unitplane_agent::{
    create_router, AgentConfig, AppState, LifecycleManager, SimulatedWork, Worker,
};
use unitplane_mediator::{build_mediator, MediatorConfig};
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

    tracing::info!("Starting Unitplane Agent");

    // Load configuration from environment
    let config = AgentConfig::from_env()?;
    let mediator_config = MediatorConfig::from_env()?;

    tracing::info!(
        host = %config.host,
        backend = %mediator_config.backend,
        queue_capacity = config.queue_capacity,
        "Loaded agent configuration"
    );

    // Connect to storage through the mediator
    let data_dir = config.data_dir.clone();
    let mediator = build_mediator(&mediator_config, || RocksStore::open(&data_dir)).await?;

    // Start the worker
    let manager = Arc::new(LifecycleManager::new(
        mediator,
        config.host.clone(),
        Arc::new(SimulatedWork::new(config.durations)),
    ));
    let interrupted = manager.interrupted_units().await?;
    if !interrupted.is_empty() {
        tracing::warn!(
            count = interrupted.len(),
            "Units on this host were left mid-transition"
        );
    }
    let (worker, _worker_task) = Worker::spawn(manager, config.queue_capacity);
    tracing::info!("Started worker loop");

    // Create router
    let app = create_router(AppState::new(worker));

    // Start server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
