//! In-process mediator backed directly by a `Store`.

use std::sync::Arc;

use async_trait::async_trait;
use unitplane_core::UnitId;
use unitplane_store::{
    ListFilter, LookupField, NewUnit, ReadDeleted, Store, Unit, UnitValues, UpdateCondition,
};

use crate::error::Result;
use crate::Mediator;

/// Mediator that calls the storage gateway in the same address space.
///
/// Storage errors are returned unchanged inside `MediatorError::Store`.
pub struct LocalMediator<S: Store> {
    store: Arc<S>,
}

impl<S: Store> LocalMediator<S> {
    /// Create a local mediator over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: Store + 'static> Mediator for LocalMediator<S> {
    async fn list_filtered(&self, filter: &ListFilter) -> Result<Vec<Unit>> {
        Ok(self.store.list(filter)?)
    }

    async fn get_by_name(&self, name: &str) -> Result<Vec<Unit>> {
        Ok(self.store.list(&ListFilter::live().named(name))?)
    }

    async fn get_by_id(&self, unit_id: &UnitId) -> Result<Unit> {
        Ok(self
            .store
            .get_by_field(LookupField::Id, &unit_id.to_string(), ReadDeleted::No)?)
    }

    async fn create(&self, unit: NewUnit) -> Result<Unit> {
        Ok(self.store.create(unit)?)
    }

    async fn update(&self, unit_id: &UnitId, values: &UnitValues) -> Result<Unit> {
        Ok(self.store.update(unit_id, values)?)
    }

    async fn update_if(
        &self,
        unit_id: &UnitId,
        condition: &UpdateCondition,
        values: &UnitValues,
    ) -> Result<Unit> {
        Ok(self.store.update_if(unit_id, condition, values)?)
    }

    async fn destroy(&self, unit_id: &UnitId) -> Result<u32> {
        Ok(self.store.soft_delete(unit_id)?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
