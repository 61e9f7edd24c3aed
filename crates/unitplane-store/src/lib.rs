//! `RocksDB` storage gateway for unitplane.
//!
//! This crate is the single point of access to persisted unit records. Every
//! other component reaches it through the mediator; nothing else opens the
//! database.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `units`: Primary unit records (CBOR), keyed by `unit_id`
//! - `units_by_name`: Index for lookups by display name
//! - `units_by_project`: Index for listing units by owning project
//! - `units_by_host`: Index for listing units by owning worker host
//!
//! Records are never physically removed. Destruction sets the soft-delete
//! marker, and reads choose whether to see deleted rows via [`ReadDeleted`].
//!
//! # Example
//!
//! ```no_run
//! use unitplane_core::HostId;
//! use unitplane_store::{ListFilter, NewUnit, Owner, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/unitplane-db").unwrap();
//!
//! let unit = store
//!     .create(NewUnit {
//!         id: None,
//!         display_name: "unit-1".to_string(),
//!         vendor_tag: "acme".to_string(),
//!         owner: Owner {
//!             user_id: "alice".to_string(),
//!             project_id: "proj".to_string(),
//!         },
//!         host: HostId::new("agent-1").unwrap(),
//!         state: None,
//!     })
//!     .unwrap();
//!
//! let live = store.list(&ListFilter::live()).unwrap();
//! assert!(live.iter().any(|u| u.id == unit.id));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    ListFilter, LookupField, NewUnit, Owner, ReadDeleted, TaskState, Unit, UnitState, UnitValues,
    UpdateCondition,
};

use unitplane_core::UnitId;

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    /// List units matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list(&self, filter: &ListFilter) -> Result<Vec<Unit>>;

    /// Return the first unit whose `field` equals `value` under `view`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing matches.
    fn get_by_field(&self, field: LookupField, value: &str, view: ReadDeleted) -> Result<Unit>;

    /// Insert a new unit and return the stored record.
    ///
    /// An identity is generated when `unit.id` is `None`. The record starts in
    /// `unit.state` (default `Ready`) with no task marker.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id is already taken, including
    /// by a soft-deleted record.
    fn create(&self, unit: NewUnit) -> Result<Unit>;

    /// Apply a partial update and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or soft-deleted.
    fn update(&self, unit_id: &UnitId, values: &UnitValues) -> Result<Unit>;

    /// Apply a partial update only if the current record satisfies
    /// `condition`. The check and the write happen atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or soft-deleted,
    /// and `StoreError::ConditionFailed` with the current record if the
    /// condition does not hold. Nothing is written in either case.
    fn update_if(
        &self,
        unit_id: &UnitId,
        condition: &UpdateCondition,
        values: &UnitValues,
    ) -> Result<Unit>;

    /// Mark a unit deleted. Returns the number of records affected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the unit is missing or already deleted.
    fn soft_delete(&self, unit_id: &UnitId) -> Result<u32>;

    /// Get a unit by ID regardless of its soft-delete marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_unit(&self, unit_id: &UnitId) -> Result<Option<Unit>>;
}
