//! Two-way merge with another database file through SQLite `ATTACH`.
//!
//! Notes are identified by `uuid4` only; a note present on one side and
//! missing on the other is copied across, oldest first. Nothing is ever
//! updated or deleted.

use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

use crate::db;
use crate::error::{Error, Result};
use crate::migrate;

const NOTE_FIELDS: &str =
    "uuid4, title, url, tags, description, comments, annotations, created_at, is_public";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttachReport {
    /// Notes copied from the attached file into this store.
    pub pulled: u64,
    /// Notes copied from this store into the attached file.
    pub pushed: u64,
}

/// Merges the store at `uri` with `pool`. A missing file is created, which
/// makes this double as a backup.
pub async fn sync_via_attach(pool: &SqlitePool, uri: &str) -> Result<AttachReport> {
    // Upgrade the other side through its own pool before attaching, so both
    // schemas are identical for the INSERT ... SELECT statements.
    let other = db::connect_path(Path::new(uri)).await?;
    let other_version = migrate::upgrade(&other).await?;
    other.close().await;

    let local_version = migrate::meta_version(pool).await?;
    if local_version != other_version {
        return Err(Error::VersionMismatch {
            local: local_version,
            remote: other_version,
        });
    }

    // ATTACH is per connection: everything below runs on this one.
    let mut conn = pool.acquire().await?;
    sqlx::query("ATTACH DATABASE ? AS other")
        .bind(uri)
        .execute(&mut *conn)
        .await?;
    debug!("attached {}", uri);

    let merged = merge(&mut conn).await;
    let detached = sqlx::query("DETACH DATABASE other")
        .execute(&mut *conn)
        .await;

    let report = merged?;
    detached?;
    info!(
        "merged with {}: pulled {}, pushed {}",
        uri, report.pulled, report.pushed
    );
    Ok(report)
}

async fn merge(conn: &mut SqliteConnection) -> Result<AttachReport> {
    let mut tx = conn.begin().await?;

    let pulled = sqlx::query(&format!(
        "INSERT INTO main.note ({fields}) \
         SELECT {fields} FROM other.note \
         WHERE NOT EXISTS (SELECT 1 FROM main.note WHERE main.note.uuid4 = other.note.uuid4) \
         ORDER BY created_at",
        fields = NOTE_FIELDS
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let pushed = sqlx::query(&format!(
        "INSERT INTO other.note ({fields}) \
         SELECT {fields} FROM main.note \
         WHERE NOT EXISTS (SELECT 1 FROM other.note WHERE other.note.uuid4 = main.note.uuid4) \
         ORDER BY created_at",
        fields = NOTE_FIELDS
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(AttachReport { pulled, pushed })
}
