//! Storage mediator for unitplane.
//!
//! Workers never open the database. Every read and write goes through a
//! [`Mediator`], which is either in-process or remote behind one interface:
//!
//! ```text
//!  ┌──────────────┐                ┌──────────────────┐
//!  │   Worker /   │  Arc<dyn       │  LocalMediator   │──► Store (RocksDB)
//!  │   Lifecycle  │──Mediator>────►├──────────────────┤
//!  │   Client     │                │  RemoteMediator  │──► POST /rpc ──► mediator server
//!  └──────────────┘                └──────────────────┘                  └► LocalMediator
//! ```
//!
//! The backend is picked at startup from [`MediatorConfig`] by
//! [`build_mediator`]. Storage errors travel unchanged in
//! [`MediatorError::Store`] on both paths, so callers handle one error set.
//!
//! # Example
//!
//! ```no_run
//! use unitplane_mediator::{build_mediator, MediatorConfig};
//! use unitplane_store::RocksStore;
//!
//! # async fn example() -> unitplane_mediator::Result<()> {
//! let config = MediatorConfig::from_env()?;
//! let mediator = build_mediator(&config, || RocksStore::open("/data")).await?;
//! let units = mediator.list(false).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod local;
pub mod protocol;
pub mod readiness;
pub mod remote;
pub mod server;

pub use config::{build_mediator, MediatorBackend, MediatorConfig};
pub use error::{MediatorError, Result};
pub use local::LocalMediator;
pub use readiness::{wait_until_ready, ReadinessConfig};
pub use remote::RemoteMediator;
pub use server::{create_router, AppState};

use async_trait::async_trait;
use unitplane_core::UnitId;
use unitplane_store::{ListFilter, NewUnit, ReadDeleted, Unit, UnitValues, UpdateCondition};

/// The mediator interface.
///
/// Implementations must behave identically: same results, same error kinds.
#[async_trait]
pub trait Mediator: Send + Sync {
    /// List units, optionally including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage gateway or transport fails.
    async fn list(&self, include_deleted: bool) -> Result<Vec<Unit>> {
        let view = if include_deleted {
            ReadDeleted::Yes
        } else {
            ReadDeleted::No
        };
        self.list_filtered(&ListFilter::live().read_deleted(view)).await
    }

    /// List units matching `filter`.
    ///
    /// Project, host and name criteria are answered from the storage indexes
    /// instead of a full scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage gateway or transport fails.
    async fn list_filtered(&self, filter: &ListFilter) -> Result<Vec<Unit>>;

    /// All live units with the given display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage gateway or transport fails.
    async fn get_by_name(&self, name: &str) -> Result<Vec<Unit>>;

    /// A live unit by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or soft-deleted.
    async fn get_by_id(&self, unit_id: &UnitId) -> Result<Unit>;

    /// Create a unit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the supplied id is taken.
    async fn create(&self, unit: NewUnit) -> Result<Unit>;

    /// Partially update a unit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or soft-deleted.
    async fn update(&self, unit_id: &UnitId, values: &UnitValues) -> Result<Unit>;

    /// Partially update a unit if `condition` holds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` with the current record on mismatch.
    async fn update_if(
        &self,
        unit_id: &UnitId,
        condition: &UpdateCondition,
        values: &UnitValues,
    ) -> Result<Unit>;

    /// Soft-delete a unit. Returns the number of records affected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or already deleted.
    async fn destroy(&self, unit_id: &UnitId) -> Result<u32>;

    /// Check that the mediator answers.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Unreachable` if a remote mediator does not answer.
    async fn ping(&self) -> Result<()>;
}
