//! # FFI Bindings
//!
//! Bindings for hosts that drive a [`FileSession`](crate::session::FileSession)
//! from outside Rust.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         FFI ARCHITECTURE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  TypeScript (file picker, list rendering)                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Web: wasm-bindgen → WasmFileStore                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  FileSession │ StoreManager │ repository │ IndexedDB backend    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Failed calls reject (or throw) with the JSON form of an
//! [`ErrorSignal`](crate::error::ErrorSignal).

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub mod wasm;
