//! # Store Schema
//!
//! Fixed identifiers of the persisted layout and the open/upgrade decision
//! every backend shares.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  offline_storage_db  (version 1)                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────────────┐                                          │
//! │  │          files            │   key: auto-increment integer            │
//! │  ├───────────────────────────┤                                          │
//! │  │ key           (store)     │   value: blob + descriptor               │
//! │  │ name                      │                                          │
//! │  │ mime_type / type          │                                          │
//! │  │ size                      │                                          │
//! │  │ last_modified             │                                          │
//! │  │ data          (bytes)     │                                          │
//! │  └───────────────────────────┘                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{Error, Result};

/// Database identifier
pub const DATABASE_NAME: &str = "offline_storage_db";

/// The only schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the single collection
pub const COLLECTION_NAME: &str = "files";

/// What opening a database at a requested version has to do first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenPlan {
    /// No database yet: run the upgrade step from nothing
    Create,
    /// Stored version is lower: run the upgrade step from `from`
    Upgrade {
        /// Version found in the store
        from: u32,
    },
    /// Stored version matches: open as-is
    Current,
}

impl OpenPlan {
    /// Whether the upgrade step (collection creation) runs.
    pub fn needs_upgrade(&self) -> bool {
        !matches!(self, OpenPlan::Current)
    }
}

/// Decide the open path from the stored version.
///
/// A stored version above the requested one is refused, as IndexedDB does
/// with `VersionError`.
pub fn plan_open(stored: Option<u32>, requested: u32) -> Result<OpenPlan> {
    match stored {
        None => Ok(OpenPlan::Create),
        Some(v) if v < requested => Ok(OpenPlan::Upgrade { from: v }),
        Some(v) if v == requested => Ok(OpenPlan::Current),
        Some(v) => Err(Error::VersionMismatch {
            expected: requested,
            found: v,
        }),
    }
}

/// Collection names double as SQLite table names.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// SQLITE LAYOUT
// ============================================================================

/// Version bookkeeping, one row per database identifier
#[cfg(not(target_arch = "wasm32"))]
pub const CREATE_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    database TEXT PRIMARY KEY,
    version INTEGER NOT NULL
);
"#;

/// SQL creating a collection table. `collection` must pass
/// [`is_valid_collection_name`].
#[cfg(not(target_arch = "wasm32"))]
pub fn create_collection_sql(collection: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{collection}" (
    -- Store-assigned key, never reused
    key INTEGER PRIMARY KEY AUTOINCREMENT,
    -- Descriptor carried by the blob
    name TEXT NOT NULL,
    mime_type TEXT NOT NULL DEFAULT '',
    size INTEGER NOT NULL,
    last_modified INTEGER NOT NULL,
    -- File contents
    data BLOB NOT NULL
);
"#
    )
}
