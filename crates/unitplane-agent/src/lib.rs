//! Unit lifecycle worker for unitplane.
//!
//! The agent owns the units assigned to its host and moves them between
//! steady states. It never opens the database; every record access goes
//! through a [`Mediator`](unitplane_mediator::Mediator).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Lifecycle Client (in-process or POST /rpc)          │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │ create (call)          │ actions (cast)
//!                 ▼                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          WorkerHandle                            │
//! │                               │ bounded mpsc                     │
//! │                               ▼                                  │
//! │   Worker loop ──spawn per command──► LifecycleManager            │
//! │                                        │  1. update_if(marker)   │
//! │                                        │  2. TransitionWork      │
//! │                                        │  3. update(target)      │
//! └────────────────────────────────────────┼────────────────────────┘
//!                                          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Mediator (local store or remote RPC)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unitplane_agent::{
//!     CreateUnitRequest, LifecycleManager, SimulatedWork, UnitAction, UnitCommand, Worker,
//! };
//! use unitplane_core::{HostId, RequestContext};
//! use unitplane_mediator::{build_mediator, MediatorConfig};
//! use unitplane_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mediator = build_mediator(&MediatorConfig::default(), || RocksStore::open("/data")).await?;
//! let manager = Arc::new(LifecycleManager::new(
//!     mediator,
//!     HostId::new("agent-1")?,
//!     Arc::new(SimulatedWork::default()),
//! ));
//! let (worker, _join) = Worker::spawn(manager, 64);
//!
//! let ctx = RequestContext::new("alice", "proj");
//! let unit = worker.create(&ctx, CreateUnitRequest::new("unit-1", "acme")).await?;
//! worker.cast(UnitCommand::new(UnitAction::Activate, unit.id))?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod server;
pub mod types;
pub mod work;
pub mod worker;

pub use action::{Precondition, Transition, UnitAction};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use manager::LifecycleManager;
pub use server::{create_router, AppState};
pub use types::{CreateUnitRequest, UnitCommand};
pub use work::{SimulatedWork, TransitionWork, WorkDurations};
pub use worker::{Worker, WorkerHandle};
