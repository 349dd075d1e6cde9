//! # Error Handling
//!
//! Error types for the offline file store.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StoreOpenFailed       - Store could not be opened/upgraded    │
//! │  │   ├── VersionMismatch       - Stored version is newer than ours     │
//! │  │   ├── CollectionMissing     - Collection absent after upgrade       │
//! │  │   ├── StorageNotReady       - No ready handle yet                   │
//! │  │   ├── OpenAborted           - Open was cancelled                    │
//! │  │   ├── Timeout               - Open did not finish in time           │
//! │  │   ├── EnumerationFailed     - Cursor/transaction error mid-scan     │
//! │  │   ├── InsertionFailed       - Add/commit error                      │
//! │  │   └── DatabaseError         - Backend-level failure                 │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── InvalidConfig         - Rejected StoreConfig                  │
//! │      ├── SerializationError    - serde failure                         │
//! │      └── Internal              - Should not happen                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every persistence error is terminal for the operation that raised it and
//! nothing else. The UI receives an [`ErrorSignal`] it can show the user.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for offline file store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the offline file store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// The store could not be opened or upgraded
    #[error("Failed to open store: {0}")]
    StoreOpenFailed(String),

    /// The stored schema version is newer than the one this build understands
    #[error("Store is at version {found}, this build supports version {expected}")]
    VersionMismatch {
        /// Version this build opens with
        expected: u32,
        /// Version found on disk
        found: u32,
    },

    /// The collection is absent even though the upgrade step completed
    #[error("Collection not found: {0}")]
    CollectionMissing(String),

    /// No ready handle is available
    #[error("Storage is not ready.")]
    StorageNotReady,

    /// An in-flight open was cancelled
    #[error("Opening the store was aborted.")]
    OpenAborted,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Cursor or transaction failure while enumerating records
    #[error("Failed to enumerate records: {0}")]
    EnumerationFailed(String),

    /// Add or commit failure while inserting a record
    #[error("Failed to save file: {0}")]
    InsertionFailed(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// - 400-499: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Storage (400-499)
            Error::StoreOpenFailed(_) => 400,
            Error::VersionMismatch { .. } => 401,
            Error::CollectionMissing(_) => 402,
            Error::StorageNotReady => 403,
            Error::OpenAborted => 404,
            Error::Timeout(_) => 405,
            Error::EnumerationFailed(_) => 406,
            Error::InsertionFailed(_) => 407,
            Error::DatabaseError(_) => 408,

            // Internal (900-999)
            Error::InvalidConfig(_) => 900,
            Error::SerializationError(_) => 901,
            Error::Internal(_) => 902,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can be resolved by the user re-invoking the
    /// action. Nothing is retried automatically.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::OpenAborted
                | Error::StorageNotReady
                | Error::EnumerationFailed(_)
                | Error::InsertionFailed(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StoreOpenFailed(err.to_string())
    }
}

// ============================================================================
// USER-VISIBLE ERROR REPRESENTATION
// ============================================================================

/// Error as shown to the user
///
/// This is what the UI surfaces when a save or load fails, so a dropped
/// save is never silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSignal {
    /// Numeric error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the user can retry the action
    pub recoverable: bool,
}

impl From<&Error> for ErrorSignal {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl From<Error> for ErrorSignal {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::StoreOpenFailed("x".into()).code(), 400);
        assert_eq!(
            Error::VersionMismatch {
                expected: 1,
                found: 2
            }
            .code(),
            401
        );
        assert_eq!(Error::StorageNotReady.code(), 403);
        assert_eq!(Error::InsertionFailed("quota".into()).code(), 407);
        assert_eq!(Error::Internal("test".into()).code(), 902);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::Timeout("open".into()).is_recoverable());
        assert!(Error::InsertionFailed("quota".into()).is_recoverable());
        assert!(!Error::StoreOpenFailed("denied".into()).is_recoverable());
        assert!(!Error::VersionMismatch {
            expected: 1,
            found: 3
        }
        .is_recoverable());
    }

    #[test]
    fn test_error_signal_conversion() {
        let err = Error::InsertionFailed("QuotaExceededError".into());
        let signal: ErrorSignal = err.into();

        assert_eq!(signal.code, 407);
        assert!(signal.message.contains("QuotaExceededError"));
        assert!(signal.recoverable);
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = Error::VersionMismatch {
            expected: 1,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Store is at version 2, this build supports version 1"
        );
    }
}
