//! # Preview Mapping
//!
//! Decides how a saved file is shown in the list, from its type and name
//! alone:
//!
//! | Rule (first match wins)     | Preview     |
//! |-----------------------------|-------------|
//! | type starts with `image`    | `Image`     |
//! | type starts with `video`    | `Video`     |
//! | name ends with `.json`      | `Json`      |
//! | anything else               | `FileName`  |
//!
//! Media previews carry a `data:` URL so a UI can drop them straight into an
//! `<img>` or `<video>` source.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::record::FileBlob;

/// How a file is previewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    /// Inline image
    Image,
    /// Video player
    Video,
    /// Pretty-printed JSON
    Json,
    /// Just the name
    FileName,
}

impl PreviewKind {
    /// Classify from MIME type and file name.
    pub fn classify(mime_type: &str, name: &str) -> Self {
        if mime_type.starts_with("image") {
            PreviewKind::Image
        } else if mime_type.starts_with("video") {
            PreviewKind::Video
        } else if name.ends_with(".json") {
            PreviewKind::Json
        } else {
            PreviewKind::FileName
        }
    }

    /// Classify a saved file
    pub fn of(blob: &FileBlob) -> Self {
        Self::classify(&blob.mime_type, &blob.name)
    }
}

/// Rendered preview of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Preview {
    /// `<img src alt>`
    Image {
        /// `data:` URL of the image
        src: String,
        /// Alt text (the file name)
        alt: String,
    },
    /// `<video controls><source src type></video>`
    Video {
        /// `data:` URL of the video
        src: String,
        /// MIME type for the `<source>` element
        mime_type: String,
    },
    /// `<pre>` block
    Json {
        /// Two-space indented JSON
        pretty: String,
    },
    /// Plain text
    FileName {
        /// The file name
        name: String,
    },
}

/// A preview keyed by its position in the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    /// Position in the view state
    pub key: usize,
    /// What to show
    #[serde(flatten)]
    pub preview: Preview,
}

/// Build the preview for one file.
pub fn render(blob: &FileBlob) -> Preview {
    match PreviewKind::of(blob) {
        PreviewKind::Image => Preview::Image {
            src: data_url(blob),
            alt: blob.name.clone(),
        },
        PreviewKind::Video => Preview::Video {
            src: data_url(blob),
            mime_type: blob.mime_type.clone(),
        },
        PreviewKind::Json => Preview::Json {
            pretty: json_dump(blob),
        },
        PreviewKind::FileName => Preview::FileName {
            name: blob.name.clone(),
        },
    }
}

/// Build previews for a whole list, keyed by index.
pub fn render_all(files: &[FileBlob]) -> Vec<ListEntry> {
    files
        .iter()
        .enumerate()
        .map(|(key, blob)| ListEntry {
            key,
            preview: render(blob),
        })
        .collect()
}

fn data_url(blob: &FileBlob) -> String {
    let mime = if blob.mime_type.is_empty() {
        "application/octet-stream"
    } else {
        blob.mime_type.as_str()
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(&blob.data))
}

/// The content re-indented if it is JSON, otherwise the descriptor.
fn json_dump(blob: &FileBlob) -> String {
    serde_json::from_slice::<serde_json::Value>(&blob.data)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .or_else(|_| serde_json::to_string_pretty(&blob.descriptor()))
        .unwrap_or_else(|_| blob.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str, mime: &str, data: &'static [u8]) -> FileBlob {
        FileBlob::with_last_modified(name, mime, 0, data)
    }

    #[test]
    fn test_dispatch_by_type_and_name() {
        assert_eq!(PreviewKind::classify("image/png", "photo.png"), PreviewKind::Image);
        assert_eq!(PreviewKind::classify("video/mp4", "clip.mp4"), PreviewKind::Video);
        assert_eq!(PreviewKind::classify("", "data.json"), PreviewKind::Json);
        assert_eq!(
            PreviewKind::classify("application/x-thing", "blob.xyz"),
            PreviewKind::FileName
        );
    }

    #[test]
    fn test_type_wins_over_name() {
        assert_eq!(PreviewKind::classify("image/svg+xml", "icon.json"), PreviewKind::Image);
        assert_eq!(
            PreviewKind::classify("application/json", "data.JSON"),
            PreviewKind::FileName
        );
    }

    #[test]
    fn test_image_preview_data_url() {
        let preview = render(&blob("dot.png", "image/png", b"\x89PNG"));
        assert_eq!(
            preview,
            Preview::Image {
                src: "data:image/png;base64,iVBORw==".to_string(),
                alt: "dot.png".to_string(),
            }
        );
    }

    #[test]
    fn test_video_preview_keeps_type() {
        match render(&blob("clip.mp4", "video/mp4", b"....")) {
            Preview::Video { src, mime_type } => {
                assert!(src.starts_with("data:video/mp4;base64,"));
                assert_eq!(mime_type, "video/mp4");
            }
            other => panic!("expected video preview, got {:?}", other),
        }
    }

    #[test]
    fn test_json_content_is_pretty_printed() {
        let preview = render(&blob("data.json", "application/json", br#"{"a":[1,2]}"#));
        assert_eq!(
            preview,
            Preview::Json {
                pretty: "{\n  \"a\": [\n    1,\n    2\n  ]\n}".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_json_falls_back_to_descriptor() {
        match render(&blob("broken.json", "", b"{nope")) {
            Preview::Json { pretty } => {
                assert!(pretty.contains("\"name\": \"broken.json\""));
                assert!(pretty.contains("\"size\": 5"));
            }
            other => panic!("expected json preview, got {:?}", other),
        }
    }

    #[test]
    fn test_render_all_keys_by_index() {
        let files = vec![blob("a.txt", "text/plain", b"a"), blob("b.json", "", b"[]")];
        let entries = render_all(&files);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, 0);
        assert_eq!(entries[0].preview, Preview::FileName { name: "a.txt".into() });
        assert_eq!(entries[1].key, 1);

        let json = serde_json::to_value(&entries[1]).unwrap();
        assert_eq!(json["kind"], "json");
        assert_eq!(json["key"], 1);
    }
}
