//! # Record Repository
//!
//! The two operations on saved files. Both take the [`Handle`] explicitly, so
//! there is nothing to call before the store is ready; skipping when it is
//! not is the caller's business (see [`crate::session`]).

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::record::FileBlob;

/// Enumerate every saved file.
///
/// One read-only transaction, a forward cursor walk to exhaustion. The
/// result is in store order (ascending key for the bundled backends); no
/// other order is promised.
pub async fn list(handle: &Handle) -> Result<Vec<FileBlob>> {
    let files = handle.connection().scan().await.map_err(|e| match e {
        Error::EnumerationFailed(_) => e,
        other => Error::EnumerationFailed(other.to_string()),
    })?;

    tracing::debug!(
        collection = handle.collection(),
        count = files.len(),
        "Enumerated saved files"
    );
    Ok(files)
}

/// Save one file under a store-assigned key.
///
/// Resolves once the read-write transaction has committed.
pub async fn add(handle: &Handle, blob: &FileBlob) -> Result<()> {
    let key = handle.connection().insert(blob).await.map_err(|e| match e {
        Error::InsertionFailed(_) => e,
        other => Error::InsertionFailed(other.to_string()),
    })?;

    tracing::debug!(
        collection = handle.collection(),
        key,
        name = %blob.name,
        size = blob.size(),
        "File added to database"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::handle::StoreManager;
    use crate::storage::MemoryBackend;
    use std::sync::Arc;

    async fn ready(backend: &MemoryBackend) -> Handle {
        StoreManager::new(Arc::new(backend.clone()), StoreConfig::default())
            .unwrap()
            .open()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_lists_nothing() {
        let handle = ready(&MemoryBackend::new()).await;
        assert!(list(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enumerate_after_insert() {
        let handle = ready(&MemoryBackend::new()).await;
        let blobs: Vec<FileBlob> = (0..5)
            .map(|i| FileBlob::with_last_modified(format!("file{}.bin", i), "", i, vec![i as u8; i as usize + 1]))
            .collect();

        for blob in &blobs {
            add(&handle, blob).await.unwrap();
        }

        let listed = list(&handle).await.unwrap();
        assert_eq!(listed.len(), blobs.len());
        for blob in &blobs {
            assert!(listed.contains(blob), "missing {}", blob.name);
        }
    }

    #[tokio::test]
    async fn test_scan_errors_are_enumeration_failures() {
        let backend = MemoryBackend::new();
        let handle = ready(&backend).await;
        backend.fail_next_scan("cursor broke");

        let err = list(&handle).await.unwrap_err();
        assert_eq!(err, Error::EnumerationFailed("cursor broke".into()));
    }

    #[tokio::test]
    async fn test_insert_errors_are_insertion_failures() {
        let backend = MemoryBackend::new();
        let handle = ready(&backend).await;
        backend.fail_next_insert("QuotaExceededError");

        let blob = FileBlob::with_last_modified("big.iso", "", 0, vec![0u8; 4]);
        let err = add(&handle, &blob).await.unwrap_err();
        assert!(matches!(err, Error::InsertionFailed(_)));
        assert!(list(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_backend_through_handle() {
        let backend = crate::storage::SqliteBackend::in_memory();
        let handle = StoreManager::new(Arc::new(backend), StoreConfig::default())
            .unwrap()
            .open()
            .await
            .unwrap();

        let blob = FileBlob::with_last_modified("data.json", "application/json", 0, r#"{"a":1}"#);
        add(&handle, &blob).await.unwrap();
        assert_eq!(list(&handle).await.unwrap(), vec![blob]);
    }
}
