//! # File Session
//!
//! The facade a UI drives: one store handle, the list of saved files it is
//! showing, and the file the user has picked but not saved yet.
//!
//! ```text
//! ┌──────────┐ start()  ┌──────────────┐ open()  ┌────────────────┐
//! │    UI    │─────────►│ FileSession  │────────►│  StoreManager  │
//! │          │ select() │              │         └───────┬────────┘
//! │          │ save()   │  view state  │ list()/add()    │ Handle
//! │          │◄─────────│  selection   │────────►┌───────▼────────┐
//! └──────────┘  events  └──────────────┘         │   repository   │
//!                                                └────────────────┘
//! ```
//!
//! Nothing here retries. Every action either completes, is skipped because
//! the store is not ready, or fails and leaves the state it found intact.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{Error, ErrorSignal, Result};
use crate::handle::StoreManager;
use crate::present::{self, ListEntry};
use crate::record::FileBlob;
use crate::repository;
use crate::storage::{self, StoreBackend};

// ============================================================================
// EVENTS AND OUTCOMES
// ============================================================================

/// Events emitted by a session for the UI to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The store is open
    Ready {
        /// Schema version it was opened at
        version: u32,
    },

    /// The store could not be opened
    OpenFailed {
        /// What went wrong
        error: ErrorSignal,
    },

    /// View state was replaced by a fresh enumeration
    Loaded {
        /// Number of files now shown
        count: usize,
    },

    /// Enumeration failed; the previous list is still shown
    LoadFailed {
        /// What went wrong
        error: ErrorSignal,
    },

    /// A file was saved and appended to the list
    Saved {
        /// Name of the saved file
        name: String,
    },

    /// Saving failed; the selection is kept for another try
    SaveFailed {
        /// What went wrong
        error: ErrorSignal,
    },

    /// The selected file changed
    SelectionChanged {
        /// Name of the new selection, if any
        name: Option<String>,
    },
}

/// Why an action did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// No ready handle
    NotReady,
    /// No file selected
    NothingSelected,
}

/// Result of [`FileSession::refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// View state now holds this many files
    Loaded(usize),
    /// Nothing was read
    Skipped(Skip),
}

/// Result of [`FileSession::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The selection was persisted and appended
    Saved,
    /// Nothing was written
    Skipped(Skip),
}

// ============================================================================
// SESSION
// ============================================================================

/// One page-load worth of state over a persistent store.
pub struct FileSession {
    id: Uuid,
    manager: StoreManager,
    view: RwLock<Vec<FileBlob>>,
    selected: Mutex<Option<FileBlob>>,
    last_error: Mutex<Option<ErrorSignal>>,
    events: broadcast::Sender<SessionEvent>,
}

impl FileSession {
    /// Create a session over an explicit backend.
    pub fn new(backend: Arc<dyn StoreBackend>, config: StoreConfig) -> Result<Self> {
        let manager = StoreManager::new(backend, config)?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            id: Uuid::new_v4(),
            manager,
            view: RwLock::new(Vec::new()),
            selected: Mutex::new(None),
            last_error: Mutex::new(None),
            events,
        })
    }

    /// Create a session over the platform's default backend.
    pub fn from_config(config: StoreConfig) -> Result<Self> {
        let backend = storage::default_backend(&config);
        Self::new(backend, config)
    }

    /// Session identifier, used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The handle manager behind this session
    pub fn manager(&self) -> &StoreManager {
        &self.manager
    }

    /// Check if the store is open
    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Open the store and load the saved files.
    pub async fn start(&self) -> Result<LoadOutcome> {
        match self.manager.open().await {
            Ok(handle) => {
                tracing::info!(session = %self.id, version = handle.version(), "Session started");
                self.emit(SessionEvent::Ready {
                    version: handle.version(),
                });
            }
            Err(err) => {
                let error = self.record_error(&err);
                self.emit(SessionEvent::OpenFailed { error });
                return Err(err);
            }
        }

        self.refresh().await
    }

    /// Replace the view state with a fresh enumeration.
    ///
    /// Skipped without a ready handle. On failure the previous list stays.
    pub async fn refresh(&self) -> Result<LoadOutcome> {
        let Some(handle) = self.manager.handle() else {
            tracing::debug!(session = %self.id, "Store not ready, skipping load");
            return Ok(LoadOutcome::Skipped(Skip::NotReady));
        };

        match repository::list(&handle).await {
            Ok(files) => {
                let count = files.len();
                *self.view.write() = files;
                self.emit(SessionEvent::Loaded { count });
                Ok(LoadOutcome::Loaded(count))
            }
            Err(err) => {
                tracing::error!(session = %self.id, error = %err, "Failed to load saved files");
                let error = self.record_error(&err);
                self.emit(SessionEvent::LoadFailed { error });
                Err(err)
            }
        }
    }

    /// Set or clear the file waiting to be saved.
    pub fn select(&self, file: Option<FileBlob>) {
        let name = file.as_ref().map(|f| f.name.clone());
        *self.selected.lock() = file;
        self.emit(SessionEvent::SelectionChanged { name });
    }

    /// The file waiting to be saved
    pub fn selected(&self) -> Option<FileBlob> {
        self.selected.lock().clone()
    }

    /// Persist the selected file.
    ///
    /// On success the file is appended to the view state and the selection
    /// is cleared, unless the user picked another file meanwhile. On failure
    /// the selection is kept and [`last_error`](Self::last_error) is set.
    pub async fn save(&self) -> Result<SaveOutcome> {
        let Some(handle) = self.manager.handle() else {
            tracing::debug!(session = %self.id, "Store not ready, skipping save");
            return Ok(SaveOutcome::Skipped(Skip::NotReady));
        };
        let Some(file) = self.selected() else {
            return Ok(SaveOutcome::Skipped(Skip::NothingSelected));
        };

        if let Err(err) = repository::add(&handle, &file).await {
            tracing::error!(
                session = %self.id,
                name = %file.name,
                error = %err,
                "Failed to save file"
            );
            let error = self.record_error(&err);
            self.emit(SessionEvent::SaveFailed { error });
            return Err(err);
        }

        self.view.write().push(file.clone());
        self.last_error.lock().take();

        let cleared = {
            let mut selected = self.selected.lock();
            if selected.as_ref() == Some(&file) {
                *selected = None;
                true
            } else {
                false
            }
        };

        tracing::info!(session = %self.id, name = %file.name, size = file.size(), "File saved");
        self.emit(SessionEvent::Saved {
            name: file.name.clone(),
        });
        if cleared {
            self.emit(SessionEvent::SelectionChanged { name: None });
        }
        Ok(SaveOutcome::Saved)
    }

    /// Snapshot of the view state
    pub fn files(&self) -> Vec<FileBlob> {
        self.view.read().clone()
    }

    /// The view state rendered for display
    pub fn previews(&self) -> Vec<ListEntry> {
        present::render_all(&self.view.read())
    }

    /// Most recent failure shown to the user, cleared by a successful save
    pub fn last_error(&self) -> Option<ErrorSignal> {
        self.last_error.lock().clone()
    }

    fn record_error(&self, err: &Error) -> ErrorSignal {
        let signal = ErrorSignal::from(err);
        *self.last_error.lock() = Some(signal.clone());
        signal
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use tokio_test::{assert_err, assert_ok};

    fn session(backend: &MemoryBackend) -> FileSession {
        FileSession::new(Arc::new(backend.clone()), StoreConfig::default()).unwrap()
    }

    fn photo() -> FileBlob {
        FileBlob::with_last_modified("photo.png", "image/png", 1_700_000_000_000, vec![0xAB; 10])
    }

    #[tokio::test]
    async fn test_actions_skip_before_ready() {
        let backend = MemoryBackend::new();
        let session = session(&backend);
        session.select(Some(photo()));

        assert_eq!(
            assert_ok!(session.refresh().await),
            LoadOutcome::Skipped(Skip::NotReady)
        );
        assert_eq!(
            assert_ok!(session.save().await),
            SaveOutcome::Skipped(Skip::NotReady)
        );

        assert_eq!(session.selected(), Some(photo()));
        assert!(session.files().is_empty());
        assert_eq!(backend.open_count(), 0);
    }

    #[tokio::test]
    async fn test_save_without_selection_is_skipped() {
        let session = session(&MemoryBackend::new());
        assert_ok!(session.start().await);

        assert_eq!(
            assert_ok!(session.save().await),
            SaveOutcome::Skipped(Skip::NothingSelected)
        );
    }

    #[tokio::test]
    async fn test_save_clears_selection_and_appends() {
        let session = session(&MemoryBackend::new());
        assert_ok!(session.start().await);
        let mut events = session.subscribe();

        session.select(Some(photo()));
        assert_eq!(assert_ok!(session.save().await), SaveOutcome::Saved);

        assert!(session.selected().is_none());
        assert_eq!(session.files(), vec![photo()]);
        assert!(session.last_error().is_none());

        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SelectionChanged {
                name: Some("photo.png".into())
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Saved {
                name: "photo.png".into()
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SelectionChanged { name: None }
        );
    }

    #[tokio::test]
    async fn test_reload_sees_saved_file() {
        let backend = MemoryBackend::new();

        let first = session(&backend);
        assert_eq!(assert_ok!(first.start().await), LoadOutcome::Loaded(0));
        first.select(Some(photo()));
        assert_ok!(first.save().await);
        assert_eq!(first.files().len(), 1);

        let second = session(&backend);
        assert_eq!(assert_ok!(second.start().await), LoadOutcome::Loaded(1));

        let files = second.files();
        assert_eq!(files[0].name, "photo.png");
        assert_eq!(files[0].mime_type, "image/png");
        assert_eq!(files[0].size(), 10);
        assert_eq!(backend.collections_created(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_disables_actions() {
        let backend = MemoryBackend::new();
        backend.fail_opens(Some("blocked"));
        let session = session(&backend);
        let mut events = session.subscribe();

        let err = assert_err!(session.start().await);
        assert_eq!(err, Error::StoreOpenFailed("blocked".into()));
        assert!(!session.is_ready());
        assert!(matches!(events.try_recv().unwrap(), SessionEvent::OpenFailed { .. }));
        assert_eq!(session.last_error().map(|e| e.code), Some(400));

        session.select(Some(photo()));
        assert_eq!(
            assert_ok!(session.save().await),
            SaveOutcome::Skipped(Skip::NotReady)
        );
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_view() {
        let backend = MemoryBackend::new();
        let session = session(&backend);
        assert_ok!(session.start().await);
        session.select(Some(photo()));
        assert_ok!(session.save().await);

        backend.fail_next_scan("transaction aborted");
        let mut events = session.subscribe();
        assert_err!(session.refresh().await);

        assert_eq!(session.files(), vec![photo()]);
        assert!(matches!(events.try_recv().unwrap(), SessionEvent::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_save_failure_keeps_selection() {
        let backend = MemoryBackend::new();
        let session = session(&backend);
        assert_ok!(session.start().await);
        session.select(Some(photo()));

        backend.fail_next_insert("QuotaExceededError");
        let err = assert_err!(session.save().await);
        assert!(matches!(err, Error::InsertionFailed(_)));

        assert_eq!(session.selected(), Some(photo()));
        assert!(session.files().is_empty());
        let signal = session.last_error().unwrap();
        assert_eq!(signal.code, 407);
        assert!(signal.recoverable);

        assert_eq!(assert_ok!(session.save().await), SaveOutcome::Saved);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_previews_follow_view_state() {
        let session = session(&MemoryBackend::new());
        assert_ok!(session.start().await);
        session.select(Some(FileBlob::with_last_modified("notes.json", "", 0, "[1]")));
        assert_ok!(session.save().await);

        let previews = session.previews();
        assert_eq!(previews.len(), 1);
        assert_eq!(
            previews[0].preview,
            present::Preview::Json {
                pretty: "[\n  1\n]".into()
            }
        );
    }
}
