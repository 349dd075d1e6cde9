//! # Records
//!
//! A saved file: opaque bytes plus the descriptor the picker attached to
//! them. The store never sees a separate schema for name, type or size;
//! they travel with the blob.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The descriptor carried by a [`FileBlob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Original file name, e.g. `photo.png`
    pub name: String,
    /// MIME type as reported by the picker; may be empty
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time (Unix ms)
    pub last_modified: i64,
}

/// A file selected by the user and persisted as one record.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBlob {
    /// Original file name
    pub name: String,
    /// MIME type; may be empty when the picker could not tell
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Last modification time (Unix ms)
    pub last_modified: i64,
    /// File contents
    pub data: Bytes,
}

impl FileBlob {
    /// Build a blob stamped with the current time.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::with_last_modified(name, mime_type, crate::time::now_millis(), data)
    }

    /// Build a blob with an explicit modification time.
    pub fn with_last_modified(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified: i64,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            last_modified,
            data: data.into(),
        }
    }

    /// Size in bytes, always derived from the payload.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Descriptor without the payload.
    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size(),
            last_modified: self.last_modified,
        }
    }

    /// Whether the blob carries any bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_follows_payload() {
        let blob = FileBlob::with_last_modified("photo.png", "image/png", 0, vec![0u8; 10]);
        assert_eq!(blob.size(), 10);
        assert_eq!(blob.descriptor().size, 10);
    }

    #[test]
    fn test_descriptor_uses_browser_keys() {
        let blob = FileBlob::with_last_modified("notes.txt", "text/plain", 1_700_000_000_000, "hi");
        let json = serde_json::to_value(blob.descriptor()).unwrap();

        assert_eq!(json["name"], "notes.txt");
        assert_eq!(json["type"], "text/plain");
        assert_eq!(json["size"], 2);
        assert_eq!(json["lastModified"], 1_700_000_000_000i64);
        assert!(json.get("mime_type").is_none());
    }

    #[test]
    fn test_new_stamps_current_time() {
        let before = crate::time::now_millis();
        let blob = FileBlob::new("a.bin", "", Bytes::from_static(b"\x00\x01"));
        assert!(blob.last_modified >= before);
        assert!(!blob.is_empty());
    }
}
