//! Core types and utilities for unitplane.
//!
//! This crate provides the foundational types shared by every unitplane crate:
//!
//! - **Identifiers**: Strongly-typed IDs for managed units and worker hosts
//! - **Request context**: The caller's user/project pair
//! - **RPC envelope**: The request/response shapes and per-method version tags
//!   used on every network hop (mediator and agent)
//!
//! # Example
//!
//! ```
//! use unitplane_core::{HostId, RpcVersion, UnitId};
//!
//! let unit_id = UnitId::generate();
//! let parsed: UnitId = unit_id.to_string().parse().unwrap();
//! assert_eq!(unit_id, parsed);
//!
//! let host = HostId::new("agent-1").unwrap();
//! assert_eq!(host.as_str(), "agent-1");
//!
//! let served: RpcVersion = "1.3".parse().unwrap();
//! assert!(served.can_serve(&"1.1".parse().unwrap()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod rpc;

pub use error::{CoreError, Result};
pub use ids::{HostId, IdError, RequestContext, UnitId};
pub use rpc::{RpcError, RpcErrorKind, RpcRequest, RpcResponse, RpcVersion};
