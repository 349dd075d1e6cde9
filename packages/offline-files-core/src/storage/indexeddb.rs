//! # IndexedDB Backend (WASM-only)
//!
//! Browser store backed by IndexedDB through `web-sys`.
//!
//! ## Request Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                        INDEXEDDB BACKEND                                 │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │  open()   ──► indexedDB.open(name, 1)                                    │
//! │                 ├─ onupgradeneeded → createObjectStore(files, autoInc)   │
//! │                 └─ onsuccess       → IDBDatabase                         │
//! │                                                                          │
//! │  scan()   ──► transaction(readonly).openCursor()                         │
//! │                 └─ onsuccess (per record) → cursor.continue()            │
//! │                                                                          │
//! │  insert() ──► transaction(readwrite).add(value)                          │
//! │                 └─ oncomplete → committed                                │
//! │                                                                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are plain objects `{ name, type, size, lastModified, data }` with
//! `data` a `Uint8Array`. Stores written by a page that saved `File` objects
//! directly are read as well.

use async_trait::async_trait;
use futures::channel::{mpsc, oneshot};
use futures::StreamExt;
use js_sys::{Object, Reflect, Uint8Array};
use send_wrapper::SendWrapper;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    IdbDatabase, IdbObjectStoreParameters, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode, IdbVersionChangeEvent,
};

use super::{OpenRequest, StoreBackend, StoreConnection};
use crate::error::{Error, Result};
use crate::record::FileBlob;

// ============================================================================
// HELPERS
// ============================================================================

fn js_message(e: &JsValue) -> String {
    if let Some(ex) = e.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", ex.name(), ex.message());
    }
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn request_error(request: &IdbRequest) -> String {
    request
        .error()
        .ok()
        .flatten()
        .map(|e| format!("{}: {}", e.name(), e.message()))
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Wait for a one-shot request (open, add) to succeed or fail.
async fn wait_for_request(request: &IdbRequest) -> std::result::Result<JsValue, String> {
    let (tx, rx) = oneshot::channel::<std::result::Result<JsValue, String>>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let tx_success = tx.clone();
    let req = request.clone();
    let onsuccess = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        let result = req.result().unwrap_or(JsValue::UNDEFINED);
        if let Some(tx) = tx_success.borrow_mut().take() {
            let _ = tx.send(Ok(result));
        }
    });

    let tx_error = tx;
    let req = request.clone();
    let onerror = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        if let Some(tx) = tx_error.borrow_mut().take() {
            let _ = tx.send(Err(request_error(&req)));
        }
    });

    request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
    request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    let result = rx.await.unwrap_or_else(|_| Err("Request dropped".to_string()));

    request.set_onsuccess(None);
    request.set_onerror(None);
    result
}

/// Wait for a transaction to commit.
async fn wait_for_transaction(tx: &IdbTransaction) -> std::result::Result<(), String> {
    let (sender, rx) = oneshot::channel::<std::result::Result<(), String>>();
    let sender = Rc::new(RefCell::new(Some(sender)));

    let on_complete = sender.clone();
    let oncomplete = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        if let Some(s) = on_complete.borrow_mut().take() {
            let _ = s.send(Ok(()));
        }
    });

    let on_fail = sender;
    let transaction = tx.clone();
    let onfail = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
        let reason = transaction
            .error()
            .map(|e| format!("{}: {}", e.name(), e.message()))
            .unwrap_or_else(|| "Transaction aborted".to_string());
        if let Some(s) = on_fail.borrow_mut().take() {
            let _ = s.send(Err(reason));
        }
    });

    tx.set_oncomplete(Some(oncomplete.as_ref().unchecked_ref()));
    tx.set_onerror(Some(onfail.as_ref().unchecked_ref()));
    tx.set_onabort(Some(onfail.as_ref().unchecked_ref()));

    let result = rx.await.unwrap_or_else(|_| Err("Transaction dropped".to_string()));

    tx.set_oncomplete(None);
    tx.set_onerror(None);
    tx.set_onabort(None);
    result
}

fn get_field(value: &JsValue, key: &str) -> JsValue {
    Reflect::get(value, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn encode(blob: &FileBlob) -> std::result::Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"name".into(), &JsValue::from_str(&blob.name))?;
    Reflect::set(&obj, &"type".into(), &JsValue::from_str(&blob.mime_type))?;
    Reflect::set(&obj, &"size".into(), &JsValue::from_f64(blob.size() as f64))?;
    Reflect::set(
        &obj,
        &"lastModified".into(),
        &JsValue::from_f64(blob.last_modified as f64),
    )?;
    Reflect::set(&obj, &"data".into(), &Uint8Array::from(blob.data.as_ref()))?;
    Ok(obj.into())
}

/// Decode a stored value; `File` objects need their bytes read, which must
/// happen after the cursor walk since awaiting a non-IDB promise ends the
/// transaction.
async fn decode(value: JsValue) -> Result<FileBlob> {
    if let Some(file) = value.dyn_ref::<web_sys::File>() {
        let buffer = JsFuture::from(file.array_buffer())
            .await
            .map_err(|e| Error::EnumerationFailed(js_message(&e)))?;
        return Ok(FileBlob::with_last_modified(
            file.name(),
            file.type_(),
            file.last_modified() as i64,
            Uint8Array::new(&buffer).to_vec(),
        ));
    }

    let data = get_field(&value, "data")
        .dyn_into::<Uint8Array>()
        .map_err(|_| Error::EnumerationFailed("record has no byte payload".to_string()))?;
    Ok(FileBlob::with_last_modified(
        get_field(&value, "name").as_string().unwrap_or_default(),
        get_field(&value, "type").as_string().unwrap_or_default(),
        get_field(&value, "lastModified").as_f64().unwrap_or(0.0) as i64,
        data.to_vec(),
    ))
}

// ============================================================================
// BACKEND
// ============================================================================

/// IndexedDB store backend
#[derive(Clone, Default)]
pub struct IndexedDbBackend;

impl IndexedDbBackend {
    /// Create the backend; nothing is opened until [`StoreBackend::open`].
    pub fn new() -> Self {
        Self
    }
}

async fn open_database(request: OpenRequest) -> Result<Arc<dyn StoreConnection>> {
    let window = web_sys::window()
        .ok_or_else(|| Error::StoreOpenFailed("No window object".to_string()))?;
    let factory = window
        .indexed_db()
        .map_err(|e| Error::StoreOpenFailed(js_message(&e)))?
        .ok_or_else(|| Error::StoreOpenFailed("IndexedDB not available".to_string()))?;

    let open_request: IdbOpenDbRequest = factory
        .open_with_u32(&request.database_name, request.version)
        .map_err(|e| Error::StoreOpenFailed(js_message(&e)))?;

    let upgrade_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
    let upgrade_slot = upgrade_error.clone();
    let collection = request.collection.clone();
    let target_version = request.version;
    let onupgradeneeded =
        Closure::<dyn FnMut(IdbVersionChangeEvent)>::new(move |event: IdbVersionChangeEvent| {
            let db = event
                .target()
                .and_then(|t| t.dyn_into::<IdbRequest>().ok())
                .and_then(|r| r.result().ok())
                .and_then(|v| v.dyn_into::<IdbDatabase>().ok());
            let Some(db) = db else {
                *upgrade_slot.borrow_mut() = Some("upgrade without a database".to_string());
                return;
            };

            if !db.object_store_names().contains(&collection) {
                let params = IdbObjectStoreParameters::new();
                params.set_auto_increment(true);
                if let Err(e) = db.create_object_store_with_optional_parameters(&collection, &params)
                {
                    *upgrade_slot.borrow_mut() = Some(js_message(&e));
                    return;
                }
                tracing::info!(
                    collection = %collection,
                    from = event.old_version(),
                    to = target_version,
                    "Created collection during upgrade"
                );
            }
        });
    open_request.set_onupgradeneeded(Some(onupgradeneeded.as_ref().unchecked_ref()));

    let result = wait_for_request(&open_request).await;
    open_request.set_onupgradeneeded(None);

    if let Some(reason) = upgrade_error.borrow_mut().take() {
        return Err(Error::StoreOpenFailed(reason));
    }
    let opened = match result {
        Ok(value) => value,
        Err(reason) if reason.starts_with("VersionError") => {
            let found = stored_version(&factory, &request.database_name).await;
            return Err(match found {
                Some(found) => Error::VersionMismatch {
                    expected: request.version,
                    found,
                },
                None => Error::StoreOpenFailed(reason),
            });
        }
        Err(reason) => return Err(Error::StoreOpenFailed(reason)),
    };
    let db: IdbDatabase = opened
        .dyn_into()
        .map_err(|_| Error::StoreOpenFailed("open did not yield a database".to_string()))?;

    if !db.object_store_names().contains(&request.collection) {
        return Err(Error::CollectionMissing(request.collection));
    }

    tracing::info!(database = %request.database_name, version = request.version, "Opened IndexedDB");

    Ok(Arc::new(IndexedDbConnection {
        db: SendWrapper::new(db),
        collection: request.collection,
        version: request.version,
    }))
}

/// Version of an existing database, opened without a version so no upgrade
/// runs.
async fn stored_version(factory: &web_sys::IdbFactory, name: &str) -> Option<u32> {
    let request = factory.open(name).ok()?;
    let db: IdbDatabase = wait_for_request(&request).await.ok()?.dyn_into().ok()?;
    let version = db.version() as u32;
    db.close();
    Some(version)
}

#[async_trait]
impl StoreBackend for IndexedDbBackend {
    fn kind(&self) -> &'static str {
        "indexeddb"
    }

    async fn open(&self, request: &OpenRequest) -> Result<Arc<dyn StoreConnection>> {
        SendWrapper::new(open_database(request.clone())).await
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

struct IndexedDbConnection {
    db: SendWrapper<IdbDatabase>,
    collection: String,
    version: u32,
}

impl IndexedDbConnection {
    async fn scan_local(&self) -> Result<Vec<FileBlob>> {
        let enum_err = |e: JsValue| Error::EnumerationFailed(js_message(&e));

        let tx = self
            .db
            .transaction_with_str_and_mode(&self.collection, IdbTransactionMode::Readonly)
            .map_err(enum_err)?;
        let store = tx.object_store(&self.collection).map_err(enum_err)?;
        let cursor_request = store.open_cursor().map_err(enum_err)?;

        // The cursor request fires onsuccess once per record
        let (sender, mut events) = mpsc::unbounded::<std::result::Result<JsValue, String>>();
        let on_success = sender.clone();
        let req = cursor_request.clone();
        let onsuccess = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            let _ = on_success.unbounded_send(Ok(req.result().unwrap_or(JsValue::NULL)));
        });
        let req = cursor_request.clone();
        let onerror = Closure::<dyn FnMut(web_sys::Event)>::new(move |_: web_sys::Event| {
            let _ = sender.unbounded_send(Err(request_error(&req)));
        });
        cursor_request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        cursor_request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        let mut values = Vec::new();
        let walk = loop {
            match events.next().await {
                Some(Ok(result)) if result.is_null() || result.is_undefined() => break Ok(()),
                Some(Ok(result)) => {
                    let cursor: web_sys::IdbCursorWithValue = match result.dyn_into() {
                        Ok(c) => c,
                        Err(_) => break Err("cursor result is not a cursor".to_string()),
                    };
                    match cursor.value() {
                        Ok(v) => values.push(v),
                        Err(e) => break Err(js_message(&e)),
                    }
                    if let Err(e) = cursor.continue_() {
                        break Err(js_message(&e));
                    }
                }
                Some(Err(reason)) => break Err(reason),
                None => break Err("cursor closed".to_string()),
            }
        };

        cursor_request.set_onsuccess(None);
        cursor_request.set_onerror(None);
        walk.map_err(Error::EnumerationFailed)?;

        let mut files = Vec::with_capacity(values.len());
        for value in values {
            files.push(decode(value).await?);
        }
        tracing::debug!(count = files.len(), "IndexedDB cursor walk complete");
        Ok(files)
    }

    async fn insert_local(&self, blob: &FileBlob) -> Result<u64> {
        let insert_err = |e: JsValue| Error::InsertionFailed(js_message(&e));

        let tx = self
            .db
            .transaction_with_str_and_mode(&self.collection, IdbTransactionMode::Readwrite)
            .map_err(insert_err)?;
        let store = tx.object_store(&self.collection).map_err(insert_err)?;
        let value = encode(blob).map_err(insert_err)?;
        let add_request = store.add(&value).map_err(insert_err)?;

        // Both listeners go on before yielding, so `complete` cannot be missed
        let (key, committed) =
            futures::join!(wait_for_request(&add_request), wait_for_transaction(&tx));
        let key = key.map_err(Error::InsertionFailed)?;
        committed.map_err(Error::InsertionFailed)?;

        Ok(key.as_f64().unwrap_or(0.0) as u64)
    }
}

#[async_trait]
impl StoreConnection for IndexedDbConnection {
    fn version(&self) -> u32 {
        self.version
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn scan(&self) -> Result<Vec<FileBlob>> {
        SendWrapper::new(self.scan_local()).await
    }

    async fn insert(&self, blob: &FileBlob) -> Result<u64> {
        SendWrapper::new(self.insert_local(blob)).await
    }
}
