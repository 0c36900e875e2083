//! Note writes and point lookups.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    NewNote, Note, NoteRow, SyncNote, IMAGE_PNG_URL, PNG_DATA_URL_PREFIX, TIMESTAMP_FORMAT,
};
use crate::tags::make_tags;

pub(crate) const NOTE_COLUMNS: &str =
    "rowid, uuid4, title, url, tags, description, comments, annotations, created_at, is_public";

/// Current UTC time in the canonical `created_at` format.
pub fn created_at_now() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Inserts a text note with a fresh uuid4 and returns it as stored.
pub async fn insert(pool: &SqlitePool, note: &NewNote) -> Result<Note> {
    insert_raw(pool, note, &note.url, note.annotations.as_bytes()).await
}

/// Inserts an image note. `annotations` must be a PNG data URL (or bare
/// base64); the decoded bytes are stored. Nothing is written when decoding
/// fails.
pub async fn insert_image(pool: &SqlitePool, note: &NewNote) -> Result<Note> {
    let payload = note
        .annotations
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .unwrap_or(&note.annotations);
    let bytes = STANDARD.decode(payload.trim())?;
    let url = if note.url.is_empty() {
        IMAGE_PNG_URL
    } else {
        note.url.as_str()
    };
    insert_raw(pool, note, url, &bytes).await
}

async fn insert_raw(pool: &SqlitePool, note: &NewNote, url: &str, annotations: &[u8]) -> Result<Note> {
    let uuid4 = Uuid::new_v4().to_string();
    let created_at = created_at_now();
    debug!("insert note {} created_at {}", uuid4, created_at);

    sqlx::query(
        "INSERT INTO note (uuid4, title, url, tags, description, comments, annotations, created_at, is_public) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&uuid4)
    .bind(&note.title)
    .bind(url)
    .bind(make_tags(&note.tags))
    .bind(&note.description)
    .bind(&note.comments)
    .bind(annotations)
    .bind(&created_at)
    .bind(note.is_public)
    .execute(pool)
    .await?;

    get_by_uuid4(pool, &uuid4).await
}

/// Deletes by rowid. A missing rowid is not an error.
pub async fn delete(pool: &SqlitePool, rowid: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM note WHERE rowid = ?")
        .bind(rowid)
        .execute(pool)
        .await?;
    debug!("delete rowid {} affected {}", rowid, result.rows_affected());
    Ok(())
}

pub async fn get_row_by_uuid4(pool: &SqlitePool, uuid4: &str) -> Result<NoteRow> {
    sqlx::query_as::<_, NoteRow>(&format!("SELECT {} FROM note WHERE uuid4 = ?", NOTE_COLUMNS))
        .bind(uuid4)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("note {}", uuid4)))
}

pub async fn get_by_uuid4(pool: &SqlitePool, uuid4: &str) -> Result<Note> {
    get_row_by_uuid4(pool, uuid4).await.map(Note::from)
}

/// All uuid4 values in insertion order.
pub async fn uuid4_list(pool: &SqlitePool) -> Result<Vec<String>> {
    let uuids = sqlx::query_scalar("SELECT uuid4 FROM note ORDER BY rowid")
        .fetch_all(pool)
        .await?;
    Ok(uuids)
}

/// Inserts a note received from a peer, keeping its identity and timestamp.
/// Returns `false` when a note with the same uuid4 already exists.
pub async fn insert_synced(pool: &SqlitePool, note: &SyncNote) -> Result<bool> {
    let annotations = STANDARD.decode(&note.annotations)?;
    let result = sqlx::query(
        "INSERT OR IGNORE INTO note (uuid4, title, url, tags, description, comments, annotations, created_at, is_public) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&note.uuid4)
    .bind(&note.title)
    .bind(&note.url)
    .bind(&note.tags)
    .bind(&note.description)
    .bind(&note.comments)
    .bind(annotations)
    .bind(&note.created_at)
    .bind(note.is_public)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Every note in lossless wire form, oldest first.
pub async fn all_sync_notes(pool: &SqlitePool) -> Result<Vec<SyncNote>> {
    let rows = sqlx::query_as::<_, NoteRow>(&format!(
        "SELECT {} FROM note ORDER BY created_at, rowid",
        NOTE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(SyncNote::from).collect())
}
