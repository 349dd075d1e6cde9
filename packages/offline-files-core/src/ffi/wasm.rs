//! # WASM Bindings
//!
//! The browser surface of the file store.
//!
//! ## Available Functions
//!
//! - Setup: `offline_files_init`, `offline_files_version`
//! - Store: `new WasmFileStore(config?)`, `start`, `abort_open`, `is_ready`
//! - Selection: `select`, `clear_selection`, `selected_name`
//! - Files: `save`, `refresh`, `files`, `last_error`
//!
//! Every method that touches the store returns a Promise.

use js_sys::Promise;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::config::StoreConfig;
use crate::error::{Error, ErrorSignal};
use crate::record::FileBlob;
use crate::session::{FileSession, LoadOutcome, SaveOutcome};

fn to_js(err: &Error) -> JsValue {
    let signal = ErrorSignal::from(err);
    match serde_json::to_string(&signal) {
        Ok(json) => JsValue::from_str(&json),
        Err(_) => JsValue::from_str(&signal.message),
    }
}

/// Set up panic hook and tracing. Safe to call more than once.
#[wasm_bindgen]
pub fn offline_files_init(verbose: bool) {
    crate::logging::init(verbose);
}

/// Get version
#[wasm_bindgen]
pub fn offline_files_version() -> String {
    crate::version().to_string()
}

/// One page session over the IndexedDB store
#[wasm_bindgen]
pub struct WasmFileStore {
    session: Arc<FileSession>,
}

#[wasm_bindgen]
impl WasmFileStore {
    /// Create a session. `config_json` overrides [`StoreConfig`] fields.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<WasmFileStore, JsValue> {
        let config = match config_json {
            Some(json) => StoreConfig::from_json(&json).map_err(|e| to_js(&e))?,
            None => StoreConfig::default(),
        };
        let session = FileSession::from_config(config).map_err(|e| to_js(&e))?;
        Ok(Self {
            session: Arc::new(session),
        })
    }

    /// Open the store and load saved files.
    ///
    /// Resolves to the number of files loaded.
    pub fn start(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            match session.start().await.map_err(|e| to_js(&e))? {
                LoadOutcome::Loaded(count) => Ok(JsValue::from(count as u32)),
                LoadOutcome::Skipped(_) => Ok(JsValue::from(0u32)),
            }
        })
    }

    /// Reload the file list. Resolves to `false` if the store is not ready.
    pub fn refresh(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let outcome = session.refresh().await.map_err(|e| to_js(&e))?;
            Ok(JsValue::from_bool(matches!(outcome, LoadOutcome::Loaded(_))))
        })
    }

    /// Cancel a stuck open
    pub fn abort_open(&self) -> bool {
        self.session.manager().abort_open()
    }

    /// Check if the store is open
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Select a file picked by the user
    pub fn select(&self, name: String, mime_type: String, last_modified: f64, bytes: Vec<u8>) {
        self.session.select(Some(FileBlob::with_last_modified(
            name,
            mime_type,
            last_modified as i64,
            bytes,
        )));
    }

    /// Drop the pending selection
    pub fn clear_selection(&self) {
        self.session.select(None);
    }

    /// Name of the pending selection
    pub fn selected_name(&self) -> Option<String> {
        self.session.selected().map(|f| f.name)
    }

    /// Save the selected file.
    ///
    /// Resolves to `true` when saved, `false` when skipped.
    pub fn save(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let outcome = session.save().await.map_err(|e| to_js(&e))?;
            Ok(JsValue::from_bool(outcome == SaveOutcome::Saved))
        })
    }

    /// Rendered previews of the saved files as JSON
    ///
    /// Returns JSON: `[{ "key": 0, "kind": "image", "src": "data:...", "alt": "..." }, ...]`
    pub fn files(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.previews()).map_err(|e| to_js(&e.into()))
    }

    /// Last failure as JSON, if any
    pub fn last_error(&self) -> Option<String> {
        self.session
            .last_error()
            .and_then(|signal| serde_json::to_string(&signal).ok())
    }
}
