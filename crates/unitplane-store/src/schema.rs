//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary unit records, keyed by `unit_id`.
    pub const UNITS: &str = "units";

    /// Index: units by display name, keyed by `name || 0x00 || unit_id`.
    pub const UNITS_BY_NAME: &str = "units_by_name";

    /// Index: units by owning project, keyed by `project_id || 0x00 || unit_id`.
    pub const UNITS_BY_PROJECT: &str = "units_by_project";

    /// Index: units by owning host, keyed by `host || 0x00 || unit_id`.
    pub const UNITS_BY_HOST: &str = "units_by_host";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::UNITS,
        cf::UNITS_BY_NAME,
        cf::UNITS_BY_PROJECT,
        cf::UNITS_BY_HOST,
    ]
}
