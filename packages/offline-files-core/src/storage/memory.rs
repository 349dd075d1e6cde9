//! # In-Memory Backend
//!
//! Keeps databases in process memory. Clones share the same databases, so a
//! second session opened on a clone sees what the first one saved, the way
//! a page reload sees the browser's store.
//!
//! Faults can be injected to exercise failure paths: refused opens, broken
//! scans and inserts, and opens that hang until released.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::schema;
use super::{OpenRequest, StoreBackend, StoreConnection};
use crate::error::{Error, Result};
use crate::record::FileBlob;

#[derive(Debug, Default)]
struct MemoryCollection {
    next_key: u64,
    records: BTreeMap<u64, FileBlob>,
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    version: u32,
    collections: HashMap<String, MemoryCollection>,
}

#[derive(Debug, Default)]
struct Faults {
    open: Option<String>,
    next_scan: Option<String>,
    next_insert: Option<String>,
}

/// In-process store backend
#[derive(Clone)]
pub struct MemoryBackend {
    databases: Arc<Mutex<HashMap<String, MemoryDatabase>>>,
    faults: Arc<Mutex<Faults>>,
    /// `true` while opens are held back
    gate: Arc<watch::Sender<bool>>,
    opens: Arc<AtomicUsize>,
    collections_created: Arc<AtomicUsize>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            databases: Arc::new(Mutex::new(HashMap::new())),
            faults: Arc::new(Mutex::new(Faults::default())),
            gate: Arc::new(gate),
            opens: Arc::new(AtomicUsize::new(0)),
            collections_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuse every open with `reason` until cleared with `None`.
    pub fn fail_opens(&self, reason: Option<&str>) {
        self.faults.lock().open = reason.map(str::to_string);
    }

    /// Fail the next scan with `reason`.
    pub fn fail_next_scan(&self, reason: &str) {
        self.faults.lock().next_scan = Some(reason.to_string());
    }

    /// Fail the next insert with `reason`; nothing is written.
    pub fn fail_next_insert(&self, reason: &str) {
        self.faults.lock().next_insert = Some(reason.to_string());
    }

    /// Make opens wait until [`release_opens`](Self::release_opens).
    pub fn hold_opens(&self) {
        self.gate.send_replace(true);
    }

    /// Let held opens proceed.
    pub fn release_opens(&self) {
        self.gate.send_replace(false);
    }

    /// Number of opens that reached the backend
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of times the upgrade step created a collection
    pub fn collections_created(&self) -> usize {
        self.collections_created.load(Ordering::SeqCst)
    }

    /// Stored version of `database`, if it exists
    pub fn stored_version(&self, database: &str) -> Option<u32> {
        self.databases.lock().get(database).map(|db| db.version)
    }

    /// Seed a database at an arbitrary version without any collection.
    pub fn seed_version(&self, database: &str, version: u32) {
        self.databases
            .lock()
            .entry(database.to_string())
            .or_default()
            .version = version;
    }

    fn open_now(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>> {
        if let Some(reason) = self.faults.lock().open.clone() {
            return Err(Error::StoreOpenFailed(reason));
        }

        let mut databases = self.databases.lock();
        let stored = databases.get(&request.database_name).map(|db| db.version);
        let plan = schema::plan_open(stored, request.version)?;

        let db = databases.entry(request.database_name.clone()).or_default();
        if plan.needs_upgrade() {
            if !db.collections.contains_key(&request.collection) {
                db.collections
                    .insert(request.collection.clone(), MemoryCollection::default());
                self.collections_created.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    database = %request.database_name,
                    collection = %request.collection,
                    "Created collection during upgrade"
                );
            }
            db.version = request.version;
        } else if !db.collections.contains_key(&request.collection) {
            return Err(Error::CollectionMissing(request.collection.clone()));
        }

        Ok(Arc::new(MemoryConnection {
            databases: self.databases.clone(),
            faults: self.faults.clone(),
            database: request.database_name.clone(),
            collection: request.collection.clone(),
            version: request.version,
        }))
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let released = gate.wait_for(|held| !*held).await.is_ok();
        if !released {
            return Err(Error::Internal("open gate dropped".into()));
        }

        self.open_now(request)
    }
}

struct MemoryConnection {
    databases: Arc<Mutex<HashMap<String, MemoryDatabase>>>,
    faults: Arc<Mutex<Faults>>,
    database: String,
    collection: String,
    version: u32,
}

impl MemoryConnection {
    fn with_collection<T>(
        &self,
        f: impl FnOnce(&mut MemoryCollection) -> T,
    ) -> Result<T> {
        let mut databases = self.databases.lock();
        databases
            .get_mut(&self.database)
            .and_then(|db| db.collections.get_mut(&self.collection))
            .map(f)
            .ok_or_else(|| Error::CollectionMissing(self.collection.clone()))
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    fn version(&self) -> u32 {
        self.version
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn scan(&self) -> Result<Vec<FileBlob>> {
        if let Some(reason) = self.faults.lock().next_scan.take() {
            return Err(Error::EnumerationFailed(reason));
        }
        self.with_collection(|c| c.records.values().cloned().collect())
    }

    async fn insert(&self, blob: &FileBlob) -> Result<u64> {
        if let Some(reason) = self.faults.lock().next_insert.take() {
            return Err(Error::InsertionFailed(reason));
        }
        self.with_collection(|c| {
            c.next_key += 1;
            c.records.insert(c.next_key, blob.clone());
            c.next_key
        })
    }
}
