//! Export every note as JSON.
//!
//! The output is an array of [`SyncNote`], the same lossless form peers
//! exchange, so image annotations survive as base64.

use sqlx::SqlitePool;
use std::path::Path;

use crate::error::Result;
use crate::models::SyncNote;
use crate::notes;

/// Export all notes as pretty JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(pool: &SqlitePool, output: Option<&Path>) -> Result<usize> {
    let all: Vec<SyncNote> = notes::all_sync_notes(pool).await?;
    let json = serde_json::to_string_pretty(&all)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} notes to {}", all.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(all.len())
}
