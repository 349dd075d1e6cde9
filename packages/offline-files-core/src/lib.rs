//! # Offline Files Core
//!
//! Local, offline persistence for user-selected files: pick a file, save it
//! to a versioned on-device store, and see every saved file again on the
//! next load.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      OFFLINE FILES CORE MODULES                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                        FileSession                              │   │
//! │  │   view state │ selected file │ last error │ events              │   │
//! │  └──────┬──────────────────────┬──────────────────────┬────────────┘   │
//! │         │                      │                      │                │
//! │  ┌──────▼──────┐        ┌──────▼──────┐        ┌──────▼──────┐         │
//! │  │   Handle    │        │ Repository  │        │   Present   │         │
//! │  │  Manager    │        │             │        │             │         │
//! │  │ - open once │        │ - list      │        │ - classify  │         │
//! │  │ - upgrade   │        │ - add       │        │ - render    │         │
//! │  │ - abort     │        │             │        │             │         │
//! │  └──────┬──────┘        └──────┬──────┘        └─────────────┘         │
//! │         └──────────┬───────────┘                                       │
//! │             ┌──────▼──────────────────────────────────────┐            │
//! │             │                 Storage                     │            │
//! │             │  IndexedDB (web) │ SQLite (native) │ Memory │            │
//! │             └─────────────────────────────────────────────┘            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types and the user-visible error signal
//! - [`config`] - Store configuration
//! - [`storage`] - Backend seam, schema constants and backends
//! - [`handle`] - Opens the store once and hands out the handle
//! - [`repository`] - Enumerate and insert records
//! - [`session`] - The facade a UI drives
//! - [`present`] - How each file is previewed
//!
//! ## Platform Support
//!
//! | Platform | Storage | Status |
//! |----------|---------|--------|
//! | Web | IndexedDB | Supported |
//! | Desktop | SQLite | Supported |
//! | Tests | In-memory | Supported |
//!
//! ## Example
//!
//! ```ignore
//! use offline_files_core::{FileBlob, FileSession, StoreConfig};
//!
//! let session = FileSession::from_config(StoreConfig::default())?;
//! session.start().await?;
//! session.select(Some(FileBlob::new("photo.png", "image/png", bytes)));
//! session.save().await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod present;
pub mod record;
pub mod repository;
pub mod session;
pub mod storage;
/// Platform-aware time utilities for native and WASM targets.
pub mod time;

#[cfg(feature = "wasm")]
pub mod ffi;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::StoreConfig;
pub use error::{Error, ErrorSignal, Result};
pub use handle::{Handle, HandleState, StoreManager};
pub use present::{Preview, PreviewKind};
pub use record::{FileBlob, FileDescriptor};
pub use session::{FileSession, LoadOutcome, SaveOutcome, SessionEvent, Skip};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Offline Files Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        #[cfg(target_os = "macos")]
        target: "macos",
        #[cfg(target_os = "linux")]
        target: "linux",
        #[cfg(target_os = "windows")]
        target: "windows",
        #[cfg(target_arch = "wasm32")]
        target: "wasm32",
        #[cfg(not(any(
            target_os = "macos",
            target_os = "linux",
            target_os = "windows",
            target_arch = "wasm32"
        )))]
        target: "unknown",
        #[cfg(target_arch = "wasm32")]
        backend: "indexeddb",
        #[cfg(not(target_arch = "wasm32"))]
        backend: "sqlite",
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target platform
    pub target: &'static str,
    /// Default storage backend
    pub backend: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert_eq!(info.backend, "sqlite");
    }
}
