//! # Storage Module
//!
//! The seam between the handle manager / repository and whatever actually
//! persists bytes.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  StoreManager ──open()──► StoreBackend ──► Arc<dyn StoreConnection>     │
//! │                                                  │                      │
//! │  repository::list ──────────────────────► scan()  (read-only cursor)   │
//! │  repository::add  ──────────────────────► insert() (read-write + commit)│
//! │                                                                         │
//! │  Backends:                                                              │
//! │  • MemoryBackend    - in-process, shared across sessions via Clone     │
//! │  • SqliteBackend    - native, file or in-memory (rusqlite)             │
//! │  • IndexedDbBackend - browser (web-sys), WASM only                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A backend's `open` performs the upgrade step (collection creation) before
//! returning, so a connection always has its collection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::record::FileBlob;

pub mod memory;
pub mod schema;

#[cfg(not(target_arch = "wasm32"))]
pub mod sqlite;

/// IndexedDB backend (WASM-only)
#[cfg(target_arch = "wasm32")]
pub mod indexeddb;

pub use memory::MemoryBackend;
#[cfg(not(target_arch = "wasm32"))]
pub use sqlite::SqliteBackend;
#[cfg(target_arch = "wasm32")]
pub use indexeddb::IndexedDbBackend;

/// Identifies the database, version and collection to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Database identifier
    pub database_name: String,
    /// Version to open at
    pub version: u32,
    /// Collection the upgrade step guarantees
    pub collection: String,
}

impl From<&StoreConfig> for OpenRequest {
    fn from(config: &StoreConfig) -> Self {
        Self {
            database_name: config.database_name.clone(),
            version: config.schema_version,
            collection: config.collection.clone(),
        }
    }
}

/// Something that can open (and on first use, create) the store.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Short backend name for logs
    fn kind(&self) -> &'static str;

    /// Open a connection, running the upgrade step first when the stored
    /// version is absent or lower than requested.
    async fn open(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>>;
}

/// A live connection whose collection is known to exist.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Version the connection was opened at
    fn version(&self) -> u32;

    /// Collection this connection reads and writes
    fn collection(&self) -> &str;

    /// Read-only transaction walking every record in store order.
    async fn scan(&self) -> Result<Vec<FileBlob>>;

    /// Read-write transaction adding one record; resolves after commit with
    /// the store-assigned key.
    async fn insert(&self, blob: &FileBlob) -> Result<u64>;
}

/// The backend a default session uses on this platform.
///
/// Native builds use SQLite (file when `config.path` is set); the browser
/// build uses IndexedDB.
pub fn default_backend(config: &StoreConfig) -> Arc<dyn StoreBackend> {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = config;
        Arc::new(IndexedDbBackend::new())
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        match &config.path {
            Some(path) => Arc::new(SqliteBackend::file(path)),
            None => Arc::new(SqliteBackend::in_memory()),
        }
    }
}
