//! Lifecycle client for unitplane units.
//!
//! This crate is the caller-facing side of the control plane. It checks each
//! requested action against the unit's current state, claims the unit with a
//! compare-and-swap on its task marker, and hands the command to the worker
//! that owns the unit's host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Request layer (external)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     LifecycleService                        │
//! │  ┌──────────────────┐  ┌───────────────┐  ┌─────────────┐   │
//! │  │ Precondition     │  │ CAS claim on  │  │ Stuck unit  │   │
//! │  │ guard            │  │ task_state    │  │ report      │   │
//! │  └──────────────────┘  └───────────────┘  └─────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!               │                                  │
//!               ▼                                  ▼
//!        ┌────────────┐                    ┌──────────────┐
//!        │  Mediator  │                    │  Dispatcher  │
//!        │ local/rpc  │                    │ local / http │
//!        └────────────┘                    └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use unitplane_control::{
//!     ControlConfig, LifecycleService, RoutingDispatcher, UnitControl,
//! };
//! use unitplane_agent::CreateUnitRequest;
//! use unitplane_core::RequestContext;
//! use unitplane_mediator::{Mediator, RemoteMediator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::from_env()?;
//! let mediator: Arc<dyn Mediator> = Arc::new(RemoteMediator::new(
//!     "http://127.0.0.1:8090",
//!     Duration::from_secs(60),
//! )?);
//! let dispatcher = RoutingDispatcher::from_config(&config, None)?;
//! let control = LifecycleService::new(mediator, dispatcher, config);
//!
//! let ctx = RequestContext::new("alice", "proj");
//! let unit = control
//!     .create_unit(&ctx, CreateUnitRequest::new("unit-1", "acme"))
//!     .await?;
//! control.activate_unit(&unit.id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The guard alone is a read-then-check. The claim that follows it is a
//! conditional update in storage, so of several concurrent requests for one
//! unit exactly one is forwarded and the rest fail with
//! `ControlError::InvalidState` naming `task_state`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::ControlConfig;
pub use dispatcher::{Dispatcher, HttpDispatcher, LocalDispatcher, RoutingDispatcher};
pub use error::{ControlError, Result};
pub use lifecycle::check_preconditions;
pub use service::{LifecycleService, UnitControl};
