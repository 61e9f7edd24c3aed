//! Key encoding utilities for `RocksDB`.
//!
//! Secondary index keys are `field || 0x00 || unit_id` so that a prefix scan
//! over `field || 0x00` yields every unit with that exact field value.

use unitplane_core::UnitId;

use crate::error::{Result, StoreError};

const SEPARATOR: u8 = 0x00;
const UNIT_ID_LEN: usize = 16;

/// Encode a unit key (just the unit ID bytes).
#[must_use]
pub fn unit_key(unit_id: &UnitId) -> Vec<u8> {
    unit_id.as_bytes().to_vec()
}

/// Encode a secondary index key: `value || 0x00 || unit_id`.
#[must_use]
pub fn index_key(value: &str, unit_id: &UnitId) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1 + UNIT_ID_LEN);
    key.extend_from_slice(value.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(unit_id.as_bytes());
    key
}

/// Encode the prefix that matches every index key for `value`.
#[must_use]
pub fn index_prefix(value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1);
    key.extend_from_slice(value.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Extract the unit ID from the tail of an index key.
///
/// # Errors
///
/// Returns `StoreError::Database` if the key is too short to hold an ID.
pub fn extract_unit_id(key: &[u8]) -> Result<UnitId> {
    let start = key
        .len()
        .checked_sub(UNIT_ID_LEN)
        .ok_or_else(|| StoreError::Database(format!("malformed index key of {} bytes", key.len())))?;
    let mut bytes = [0u8; UNIT_ID_LEN];
    bytes.copy_from_slice(&key[start..]);
    Ok(UnitId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}
