//! # Store Handle Manager
//!
//! Owns the connection lifecycle for one session.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HANDLE LIFECYCLE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌──────────┐   open()   ┌──────────┐   success   ┌──────────┐         │
//! │   │ Unopened │──────────►│ Opening  │────────────►│  Ready   │         │
//! │   └──────────┘            └────┬─────┘             └──────────┘         │
//! │                                │ error / abort / timeout                │
//! │                                ▼                                        │
//! │                           ┌──────────┐   open() again                   │
//! │                           │  Failed  │─────────────► Opening            │
//! │                           └──────────┘                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `open()` while `Ready` hands back the same handle; `open()` while
//! `Opening` joins the attempt in flight. The backend is never asked twice
//! for the same session unless an attempt failed.

use futures::future::{AbortHandle, Abortable, Aborted};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::storage::{OpenRequest, StoreBackend, StoreConnection};

/// A live connection whose collection is guaranteed to exist.
///
/// Cheap to clone; immutable once handed out.
#[derive(Clone)]
pub struct Handle {
    connection: Arc<dyn StoreConnection>,
    database_name: Arc<str>,
}

impl Handle {
    pub(crate) fn connection(&self) -> &dyn StoreConnection {
        self.connection.as_ref()
    }

    /// Database this handle is connected to
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Collection records are read from and written to
    pub fn collection(&self) -> &str {
        self.connection.collection()
    }

    /// Schema version the connection was opened at
    pub fn version(&self) -> u32 {
        self.connection.version()
    }

    /// Whether two handles share one connection
    pub fn same_connection(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("database", &self.database_name)
            .field("collection", &self.collection())
            .field("version", &self.version())
            .finish()
    }
}

/// Where the handle is in its lifecycle
#[derive(Debug, Clone)]
pub enum HandleState {
    /// `open()` has not been called
    Unopened,
    /// An open is in flight
    Opening,
    /// The handle is usable
    Ready(Handle),
    /// The last open failed; the store is unavailable until reopened
    Failed(Error),
}

impl HandleState {
    /// Short label for logs and UIs
    pub fn label(&self) -> &'static str {
        match self {
            HandleState::Unopened => "unopened",
            HandleState::Opening => "opening",
            HandleState::Ready(_) => "ready",
            HandleState::Failed(_) => "failed",
        }
    }

    fn is_settled(&self) -> bool {
        matches!(self, HandleState::Ready(_) | HandleState::Failed(_))
    }
}

/// Opens the store once and hands out the resulting [`Handle`].
pub struct StoreManager {
    backend: Arc<dyn StoreBackend>,
    config: StoreConfig,
    state: watch::Sender<HandleState>,
    abort: Mutex<Option<AbortHandle>>,
}

impl StoreManager {
    /// Create a manager; nothing is opened yet.
    pub fn new(backend: Arc<dyn StoreBackend>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(HandleState::Unopened);
        Ok(Self {
            backend,
            config,
            state,
            abort: Mutex::new(None),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Snapshot of the current state
    pub fn state(&self) -> HandleState {
        self.state.borrow().clone()
    }

    /// The handle, if ready
    pub fn handle(&self) -> Option<Handle> {
        match &*self.state.borrow() {
            HandleState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Check if the handle is ready
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), HandleState::Ready(_))
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<HandleState> {
        self.state.subscribe()
    }

    /// Wait until an open attempt settles; `None` if it failed.
    ///
    /// Returns immediately with `None` if nothing was ever opened.
    pub async fn wait_ready(&self) -> Option<Handle> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|s| s.is_settled() || matches!(s, HandleState::Unopened))
            .await
            .map(|s| s.clone())
            .ok()?;
        match settled {
            HandleState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// Open the store, or return the handle from an earlier open.
    ///
    /// Concurrent callers share one attempt. A failure is logged, leaves the
    /// state `Failed`, and is returned to every caller of that attempt.
    pub async fn open(&self) -> Result<Handle> {
        let mut claimed = false;
        self.state.send_if_modified(|state| match state {
            HandleState::Unopened | HandleState::Failed(_) => {
                *state = HandleState::Opening;
                claimed = true;
                true
            }
            _ => false,
        });

        if !claimed {
            return self.join_open().await;
        }

        let guard = OpeningGuard { manager: self };
        let result = self.run_open().await;
        std::mem::forget(guard);
        self.abort.lock().take();

        match result {
            Ok(handle) => {
                tracing::info!(
                    backend = self.backend.kind(),
                    database = %self.config.database_name,
                    version = handle.version(),
                    "Store ready"
                );
                self.state.send_replace(HandleState::Ready(handle.clone()));
                Ok(handle)
            }
            Err(err) => {
                tracing::error!(
                    backend = self.backend.kind(),
                    database = %self.config.database_name,
                    error = %err,
                    "Failed to open store"
                );
                self.state.send_replace(HandleState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// Cancel an open in flight. Returns whether there was one to cancel.
    pub fn abort_open(&self) -> bool {
        match self.abort.lock().take() {
            Some(handle) => {
                tracing::warn!(database = %self.config.database_name, "Aborting store open");
                handle.abort();
                true
            }
            None => false,
        }
    }

    async fn join_open(&self) -> Result<Handle> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(HandleState::is_settled)
            .await
            .map(|s| s.clone())
            .map_err(|_| Error::Internal("handle state channel closed".into()))?;
        match settled {
            HandleState::Ready(handle) => Ok(handle),
            HandleState::Failed(err) => Err(err),
            _ => Err(Error::StorageNotReady),
        }
    }

    async fn run_open(&self) -> Result<Handle> {
        let request = OpenRequest::from(&self.config);
        let (abort_handle, registration) = AbortHandle::new_pair();
        *self.abort.lock() = Some(abort_handle);

        tracing::debug!(
            backend = self.backend.kind(),
            database = %request.database_name,
            version = request.version,
            "Opening store"
        );

        let open = Abortable::new(self.backend.open(&request), registration);
        let connection = self.with_timeout(open).await?.map_err(|Aborted| Error::OpenAborted)??;

        Ok(Handle {
            connection,
            database_name: Arc::from(request.database_name.as_str()),
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn with_timeout<F: std::future::Future>(&self, fut: F) -> Result<F::Output> {
        match self.config.open_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                Error::Timeout(format!("store did not open within {} ms", limit.as_millis()))
            }),
            None => Ok(fut.await),
        }
    }

    #[cfg(target_arch = "wasm32")]
    async fn with_timeout<F: std::future::Future>(&self, fut: F) -> Result<F::Output> {
        if self.config.open_timeout.is_some() {
            tracing::warn!("open_timeout is not supported in the browser; use abort_open()");
        }
        Ok(fut.await)
    }
}

/// Marks the attempt aborted if the `open()` future is dropped mid-flight,
/// so joiners are not left waiting on `Opening` forever.
struct OpeningGuard<'a> {
    manager: &'a StoreManager,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        self.manager.abort.lock().take();
        self.manager
            .state
            .send_replace(HandleState::Failed(Error::OpenAborted));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::time::Duration;

    fn manager(backend: &MemoryBackend) -> StoreManager {
        StoreManager::new(Arc::new(backend.clone()), StoreConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_starts_unopened() {
        let backend = MemoryBackend::new();
        let manager = manager(&backend);

        assert!(matches!(manager.state(), HandleState::Unopened));
        assert!(manager.handle().is_none());
        assert!(manager.wait_ready().await.is_none());
        assert_eq!(backend.open_count(), 0);
    }

    #[tokio::test]
    async fn test_open_twice_reuses_handle() {
        let backend = MemoryBackend::new();
        let manager = manager(&backend);

        let first = manager.open().await.unwrap();
        let second = manager.open().await.unwrap();

        assert!(first.same_connection(&second));
        assert_eq!(backend.open_count(), 1);
        assert_eq!(backend.collections_created(), 1);
        assert_eq!(first.collection(), "files");
        assert_eq!(first.version(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_attempt() {
        let backend = MemoryBackend::new();
        backend.hold_opens();
        let manager = manager(&backend);

        let (a, b, _) = tokio::join!(manager.open(), manager.open(), async {
            tokio::task::yield_now().await;
            assert_eq!(manager.state().label(), "opening");
            backend.release_opens();
        });

        assert!(a.unwrap().same_connection(&b.unwrap()));
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_failed_state() {
        let backend = MemoryBackend::new();
        backend.fail_opens(Some("permission denied"));
        let manager = manager(&backend);

        let err = manager.open().await.unwrap_err();
        assert_eq!(err, Error::StoreOpenFailed("permission denied".into()));
        assert!(matches!(manager.state(), HandleState::Failed(_)));
        assert!(manager.handle().is_none());
    }

    #[tokio::test]
    async fn test_reopen_after_failure() {
        let backend = MemoryBackend::new();
        backend.fail_opens(Some("quota"));
        let manager = manager(&backend);
        assert!(manager.open().await.is_err());

        backend.fail_opens(None);
        assert!(manager.open().await.is_ok());
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_abort_stuck_open() {
        let backend = MemoryBackend::new();
        backend.hold_opens();
        let manager = manager(&backend);

        let (result, aborted) = tokio::join!(manager.open(), async {
            tokio::task::yield_now().await;
            manager.abort_open()
        });

        assert!(aborted);
        assert_eq!(result.unwrap_err(), Error::OpenAborted);
        assert!(matches!(manager.state(), HandleState::Failed(Error::OpenAborted)));
        assert!(!manager.abort_open());
    }

    #[tokio::test]
    async fn test_open_timeout() {
        let backend = MemoryBackend::new();
        backend.hold_opens();
        let config = StoreConfig {
            open_timeout: Some(Duration::from_millis(20)),
            ..StoreConfig::default()
        };
        let manager = StoreManager::new(Arc::new(backend.clone()), config).unwrap();

        let err = manager.open().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_dropped_open_does_not_strand_state() {
        let backend = MemoryBackend::new();
        backend.hold_opens();
        let manager = manager(&backend);

        {
            let open = manager.open();
            tokio::pin!(open);
            let polled = futures::poll!(open.as_mut());
            assert!(polled.is_pending());
        }

        assert!(matches!(manager.state(), HandleState::Failed(Error::OpenAborted)));
    }

    #[tokio::test]
    async fn test_newer_store_version_fails() {
        let backend = MemoryBackend::new();
        backend.seed_version("offline_storage_db", 5);
        let manager = manager(&backend);

        let err = manager.open().await.unwrap_err();
        assert_eq!(
            err,
            Error::VersionMismatch {
                expected: 1,
                found: 5
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig {
            database_name: " ".into(),
            ..StoreConfig::default()
        };
        let result = StoreManager::new(Arc::new(MemoryBackend::new()), config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
