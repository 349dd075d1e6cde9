//! # Save and List Demo
//!
//! Saves a file in one session and sees it again from a second session on
//! the same SQLite store, the way a page reload would.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example save_and_list
//! ```

use offline_files_core::{present, FileBlob, FileSession, StoreConfig};

#[tokio::main]
async fn main() -> offline_files_core::Result<()> {
    offline_files_core::logging::init(false);
    println!("=== Offline Files Core: Save and List Demo ===\n");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("offline_storage.db");
    let config = StoreConfig::with_path(path.to_string_lossy());

    // Step 1: First load, empty store
    println!("Step 1: Opening a fresh store...");
    let first = FileSession::from_config(config.clone())?;
    first.start().await?;
    println!("  Files on load: {}", first.files().len());
    println!();

    // Step 2: Pick and save a few files
    println!("Step 2: Saving files...");
    let picks = [
        FileBlob::new("photo.png", "image/png", vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0, 0, 0]),
        FileBlob::new("settings.json", "application/json", r#"{"theme":"dark"}"#),
        FileBlob::new("notes.txt", "text/plain", "buy milk"),
    ];
    for file in picks {
        let name = file.name.clone();
        first.select(Some(file));
        first.save().await?;
        println!("  Saved {} (selection now {:?})", name, first.selected().map(|f| f.name));
    }
    println!();

    // Step 3: Reload
    println!("Step 3: Reloading from a new session...");
    let second = FileSession::from_config(config)?;
    second.start().await?;

    for entry in second.previews() {
        match &entry.preview {
            present::Preview::Image { alt, src } => {
                println!("  [{}] image {} ({} byte data URL)", entry.key, alt, src.len())
            }
            present::Preview::Video { mime_type, .. } => {
                println!("  [{}] video {}", entry.key, mime_type)
            }
            present::Preview::Json { pretty } => println!("  [{}] json\n{}", entry.key, pretty),
            present::Preview::FileName { name } => println!("  [{}] {}", entry.key, name),
        }
    }

    println!();
    println!("Step 4: Descriptors as stored...");
    for file in second.files() {
        let modified = offline_files_core::time::format_millis(file.last_modified)
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {:<14} {:>4} bytes  {}", file.name, file.size(), modified);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
