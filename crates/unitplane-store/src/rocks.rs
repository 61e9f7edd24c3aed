//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use unitplane_core::UnitId;

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{
    ListFilter, LookupField, NewUnit, ReadDeleted, Unit, UnitState, UnitValues, UpdateCondition,
};
use crate::Store;

/// RocksDB-backed storage implementation.
///
/// Read-modify-write operations hold `write_lock` across the read and the
/// `WriteBatch`, so concurrent writers to one record are serialized.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Collect the unit IDs stored under `value` in an index column family.
    fn scan_index(&self, cf_name: &str, value: &str) -> Result<Vec<UnitId>> {
        let cf_index = self.cf(cf_name)?;
        let prefix = keys::index_prefix(value);

        let mut ids = Vec::new();
        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            ids.push(keys::extract_unit_id(&key)?);
        }

        Ok(ids)
    }

    fn load_all(&self, ids: &[UnitId]) -> Result<Vec<Unit>> {
        let mut units = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(unit) = self.get_unit(id)? {
                units.push(unit);
            }
        }
        Ok(units)
    }

    fn scan_all(&self) -> Result<Vec<Unit>> {
        let cf = self.cf(cf::UNITS)?;

        let mut units = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            units.push(Self::deserialize(&value)?);
        }
        Ok(units)
    }

    /// Write a unit and its index entries in one batch.
    ///
    /// `previous_name` is the display name currently indexed, if any.
    fn write_unit(&self, unit: &Unit, previous_name: Option<&str>) -> Result<()> {
        let cf_units = self.cf(cf::UNITS)?;
        let cf_by_name = self.cf(cf::UNITS_BY_NAME)?;
        let cf_by_project = self.cf(cf::UNITS_BY_PROJECT)?;
        let cf_by_host = self.cf(cf::UNITS_BY_HOST)?;

        let value = Self::serialize(unit)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_units, keys::unit_key(&unit.id), &value);

        if let Some(old) = previous_name {
            if old != unit.display_name {
                batch.delete_cf(&cf_by_name, keys::index_key(old, &unit.id));
            }
        }
        batch.put_cf(&cf_by_name, keys::index_key(&unit.display_name, &unit.id), []);

        // Owner and host never change; these puts are idempotent
        batch.put_cf(
            &cf_by_project,
            keys::index_key(&unit.owner.project_id, &unit.id),
            [],
        );
        batch.put_cf(&cf_by_host, keys::index_key(unit.host.as_str(), &unit.id), []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Read a live unit, run `check` against it, apply `values`, and persist.
    fn modify<F>(&self, unit_id: &UnitId, check: F, values: &UnitValues) -> Result<Unit>
    where
        F: FnOnce(&Unit) -> Result<()>,
    {
        let _guard = self.write_lock.lock();

        let mut unit = self
            .get_unit(unit_id)?
            .filter(|u| !u.deleted)
            .ok_or(StoreError::NotFound)?;
        check(&unit)?;

        let previous_name = unit.display_name.clone();
        unit.apply(values);
        unit.updated_at = Utc::now();
        self.write_unit(&unit, Some(&previous_name))?;

        Ok(unit)
    }

    fn sorted(mut units: Vec<Unit>) -> Vec<Unit> {
        units.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        units
    }
}

impl Store for RocksStore {
    fn list(&self, filter: &ListFilter) -> Result<Vec<Unit>> {
        // Narrow with the most selective index available, then filter fully
        let candidates = if let Some(name) = &filter.display_name {
            self.load_all(&self.scan_index(cf::UNITS_BY_NAME, name)?)?
        } else if let Some(project) = &filter.project_id {
            self.load_all(&self.scan_index(cf::UNITS_BY_PROJECT, project)?)?
        } else if let Some(host) = &filter.host {
            self.load_all(&self.scan_index(cf::UNITS_BY_HOST, host.as_str())?)?
        } else {
            self.scan_all()?
        };

        Ok(Self::sorted(
            candidates
                .into_iter()
                .filter(|unit| filter.matches(unit))
                .collect(),
        ))
    }

    fn get_by_field(&self, field: LookupField, value: &str, view: ReadDeleted) -> Result<Unit> {
        let candidates = match field {
            LookupField::Id => {
                // A malformed id cannot name a stored record
                let Ok(unit_id) = value.parse::<UnitId>() else {
                    return Err(StoreError::NotFound);
                };
                self.get_unit(&unit_id)?.into_iter().collect()
            }
            LookupField::DisplayName => self.load_all(&self.scan_index(cf::UNITS_BY_NAME, value)?)?,
            LookupField::Host => self.load_all(&self.scan_index(cf::UNITS_BY_HOST, value)?)?,
        };

        Self::sorted(candidates)
            .into_iter()
            .find(|unit| view.admits(unit))
            .ok_or(StoreError::NotFound)
    }

    fn create(&self, new: NewUnit) -> Result<Unit> {
        let _guard = self.write_lock.lock();

        let unit_id = new.id.unwrap_or_else(UnitId::generate);
        if self.get_unit(&unit_id)?.is_some() {
            return Err(StoreError::Conflict {
                field: "id".to_string(),
            });
        }

        let now = Utc::now();
        let unit = Unit {
            id: unit_id,
            display_name: new.display_name,
            owner: new.owner,
            vendor_tag: new.vendor_tag,
            state: new.state.unwrap_or(UnitState::Ready),
            task_state: None,
            host: new.host,
            progress: 0,
            created_at: now,
            updated_at: now,
            launched_at: None,
            terminated_at: None,
            deleted: false,
            deleted_at: None,
        };
        self.write_unit(&unit, None)?;

        tracing::debug!(unit_id = %unit.id, host = %unit.host, "Unit record created");
        Ok(unit)
    }

    fn update(&self, unit_id: &UnitId, values: &UnitValues) -> Result<Unit> {
        self.modify(unit_id, |_| Ok(()), values)
    }

    fn update_if(
        &self,
        unit_id: &UnitId,
        condition: &UpdateCondition,
        values: &UnitValues,
    ) -> Result<Unit> {
        self.modify(
            unit_id,
            |current| {
                if condition.matches(current) {
                    Ok(())
                } else {
                    Err(StoreError::ConditionFailed(Box::new(current.clone())))
                }
            },
            values,
        )
    }

    fn soft_delete(&self, unit_id: &UnitId) -> Result<u32> {
        let _guard = self.write_lock.lock();

        let mut unit = self
            .get_unit(unit_id)?
            .filter(|u| !u.deleted)
            .ok_or(StoreError::NotFound)?;

        let now = Utc::now();
        unit.state = UnitState::Deleted;
        unit.task_state = None;
        unit.deleted = true;
        unit.deleted_at = Some(now);
        unit.terminated_at = Some(now);
        unit.updated_at = now;

        let name = unit.display_name.clone();
        self.write_unit(&unit, Some(&name))?;

        tracing::debug!(unit_id = %unit_id, "Unit record soft-deleted");
        Ok(1)
    }

    fn get_unit(&self, unit_id: &UnitId) -> Result<Option<Unit>> {
        let cf = self.cf(cf::UNITS)?;
        let key = keys::unit_key(unit_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }
}
