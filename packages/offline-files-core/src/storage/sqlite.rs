//! # SQLite Backend
//!
//! Native store backed by a SQLite file (or an in-memory database for tests).
//!
//! ```text
//! ┌─────────────────┐
//! │  StoreManager   │  open() once per session
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  SqliteBackend  │  schema_version check → upgrade step
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    rusqlite     │  one connection, shared behind a mutex
//! └─────────────────┘
//! ```
//!
//! Each open of a file backend creates its own connection, so two sessions
//! on the same path behave like two page loads of the same origin.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;

use super::schema::{self, OpenPlan};
use super::{OpenRequest, StoreBackend, StoreConnection};
use crate::error::{Error, Result};
use crate::record::FileBlob;

#[derive(Clone)]
enum Target {
    File(PathBuf),
    /// In-memory databases vanish with their connection, so the first one
    /// opened is kept and handed to later opens.
    Memory(Arc<Mutex<Option<Arc<Mutex<Connection>>>>>),
}

/// SQLite store backend
#[derive(Clone)]
pub struct SqliteBackend {
    target: Target,
}

impl SqliteBackend {
    /// Backend persisting to a database file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    /// Backend keeping everything in memory; clones share the database
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory(Arc::new(Mutex::new(None))),
        }
    }

    fn connect(&self) -> Result<Arc<Mutex<Connection>>> {
        match &self.target {
            Target::File(path) => {
                let conn = Connection::open(path).map_err(|e| {
                    Error::StoreOpenFailed(format!(
                        "Failed to open database {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Arc::new(Mutex::new(conn)))
            }
            Target::Memory(shared) => {
                let mut shared = shared.lock();
                if let Some(conn) = shared.as_ref() {
                    return Ok(conn.clone());
                }
                let conn = Connection::open_in_memory().map_err(|e| {
                    Error::StoreOpenFailed(format!("Failed to create in-memory database: {}", e))
                })?;
                let conn = Arc::new(Mutex::new(conn));
                *shared = Some(conn.clone());
                Ok(conn)
            }
        }
    }

    fn open_blocking(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>> {
        if !schema::is_valid_collection_name(&request.collection) {
            return Err(Error::InvalidConfig(format!(
                "collection name '{}' is not a valid table name",
                request.collection
            )));
        }

        let conn = self.connect()?;
        init_schema(&mut conn.lock(), request)?;

        Ok(Arc::new(SqliteConnection {
            conn,
            collection: request.collection.clone(),
            version: request.version,
        }))
    }
}

/// Run the version check and, when needed, the upgrade step, inside one
/// transaction so a half-created store is never observed.
fn init_schema(conn: &mut Connection, request: &OpenRequest) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::StoreOpenFailed(format!("Failed to begin upgrade: {}", e)))?;

    tx.execute_batch(schema::CREATE_VERSION_TABLE)
        .map_err(|e| Error::StoreOpenFailed(format!("Failed to create version table: {}", e)))?;

    let stored: Option<u32> = tx
        .query_row(
            "SELECT version FROM schema_version WHERE database = ?",
            params![request.database_name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::StoreOpenFailed(format!("Failed to read schema version: {}", e)))?;

    match schema::plan_open(stored, request.version)? {
        OpenPlan::Create | OpenPlan::Upgrade { .. } => {
            tx.execute_batch(&schema::create_collection_sql(&request.collection))
                .map_err(|e| {
                    Error::StoreOpenFailed(format!("Failed to create collection: {}", e))
                })?;
            tx.execute(
                "INSERT INTO schema_version (database, version) VALUES (?, ?)
                 ON CONFLICT(database) DO UPDATE SET version = excluded.version",
                params![request.database_name, request.version],
            )
            .map_err(|e| Error::StoreOpenFailed(format!("Failed to set schema version: {}", e)))?;

            tracing::info!(
                database = %request.database_name,
                collection = %request.collection,
                from = ?stored,
                to = request.version,
                "Store upgraded"
            );
        }
        OpenPlan::Current => {
            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
                    params![request.collection],
                    |row| row.get(0),
                )
                .map_err(|e| Error::StoreOpenFailed(format!("Failed to inspect schema: {}", e)))?;
            if !exists {
                return Err(Error::CollectionMissing(request.collection.clone()));
            }
            tracing::debug!(database = %request.database_name, version = request.version, "Store schema current");
        }
    }

    tx.commit()
        .map_err(|e| Error::StoreOpenFailed(format!("Failed to commit upgrade: {}", e)))?;
    Ok(())
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn open(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>> {
        self.open_blocking(request)
    }
}

struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    version: u32,
}

impl SqliteConnection {
    fn scan_blocking(&self) -> Result<Vec<FileBlob>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                r#"SELECT name, mime_type, last_modified, data FROM "{}" ORDER BY key"#,
                self.collection
            ))
            .map_err(|e| Error::EnumerationFailed(format!("Failed to prepare scan: {}", e)))?;

        let mut rows = stmt
            .query([])
            .map_err(|e| Error::EnumerationFailed(format!("Failed to open cursor: {}", e)))?;

        let mut files = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| Error::EnumerationFailed(format!("Failed to advance cursor: {}", e)))?
        {
            let data: Vec<u8> = row
                .get(3)
                .map_err(|e| Error::EnumerationFailed(format!("Failed to read record: {}", e)))?;
            files.push(FileBlob {
                name: row
                    .get(0)
                    .map_err(|e| Error::EnumerationFailed(format!("Failed to read record: {}", e)))?,
                mime_type: row
                    .get(1)
                    .map_err(|e| Error::EnumerationFailed(format!("Failed to read record: {}", e)))?,
                last_modified: row
                    .get(2)
                    .map_err(|e| Error::EnumerationFailed(format!("Failed to read record: {}", e)))?,
                data: data.into(),
            });
        }

        Ok(files)
    }

    fn insert_blocking(&self, blob: &FileBlob) -> Result<u64> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::InsertionFailed(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            &format!(
                r#"INSERT INTO "{}" (name, mime_type, size, last_modified, data) VALUES (?, ?, ?, ?, ?)"#,
                self.collection
            ),
            params![
                blob.name,
                blob.mime_type,
                blob.size() as i64,
                blob.last_modified,
                blob.data.as_ref(),
            ],
        )
        .map_err(|e| Error::InsertionFailed(format!("Failed to add record: {}", e)))?;

        let key = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| Error::InsertionFailed(format!("Failed to commit: {}", e)))?;

        Ok(key as u64)
    }
}

#[async_trait]
impl StoreConnection for SqliteConnection {
    fn version(&self) -> u32 {
        self.version
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn scan(&self) -> Result<Vec<FileBlob>> {
        self.scan_blocking()
    }

    async fn insert(&self, blob: &FileBlob) -> Result<u64> {
        self.insert_blocking(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OpenRequest {
        OpenRequest {
            database_name: schema::DATABASE_NAME.into(),
            version: schema::SCHEMA_VERSION,
            collection: schema::COLLECTION_NAME.into(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_open_and_roundtrip() {
        let backend = SqliteBackend::in_memory();
        let conn = backend.open(&request()).await.unwrap();
        assert!(conn.scan().await.unwrap().is_empty());

        let blob = FileBlob::with_last_modified("photo.png", "image/png", 42, vec![7u8; 10]);
        let key = conn.insert(&blob).await.unwrap();
        assert!(key > 0);

        let files = conn.scan().await.unwrap();
        assert_eq!(files, vec![blob]);
    }

    #[tokio::test]
    async fn test_in_memory_clones_share_database() {
        let backend = SqliteBackend::in_memory();
        let conn = backend.open(&request()).await.unwrap();
        conn.insert(&FileBlob::with_last_modified("a.txt", "text/plain", 0, "a"))
            .await
            .unwrap();

        let again = backend.clone().open(&request()).await.unwrap();
        assert_eq!(again.scan().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.db");

        {
            let conn = SqliteBackend::file(&path).open(&request()).await.unwrap();
            conn.insert(&FileBlob::with_last_modified("clip.mp4", "video/mp4", 1, vec![1, 2, 3]))
                .await
                .unwrap();
        }

        let conn = SqliteBackend::file(&path).open(&request()).await.unwrap();
        let files = conn.scan().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "clip.mp4");
        assert_eq!(files[0].data.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_newer_stored_version_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.db");

        let newer = OpenRequest {
            version: 2,
            ..request()
        };
        SqliteBackend::file(&path).open(&newer).await.unwrap();

        let result = SqliteBackend::file(&path).open(&request()).await;
        assert!(matches!(
            result,
            Err(Error::VersionMismatch {
                expected: 1,
                found: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_unwritable_path_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("files.db");

        let result = SqliteBackend::file(&path).open(&request()).await;
        assert!(matches!(result, Err(Error::StoreOpenFailed(_))));
    }

    #[tokio::test]
    async fn test_reopen_does_not_recreate_collection() {
        let backend = SqliteBackend::in_memory();
        let conn = backend.open(&request()).await.unwrap();
        conn.insert(&FileBlob::with_last_modified("a", "", 0, "x")).await.unwrap();

        backend.open(&request()).await.unwrap();
        assert_eq!(conn.scan().await.unwrap().len(), 1);
    }
}
