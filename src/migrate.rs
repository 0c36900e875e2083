//! Schema creation and versioned upgrades.
//!
//! The schema version lives in `meta.version`. A database without a `meta`
//! table predates versioning and is treated as `0.3.10`. Each upgrade step
//! runs in its own transaction together with its version bump, so an
//! interrupted upgrade resumes at the step that failed.

use chrono::{NaiveDateTime, Timelike as _};
use semver::Version;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::models::TIMESTAMP_FORMAT;

/// Schema version written by this build.
pub const SCHEMA_VERSION: &str = "0.6.0";

/// Version assumed for databases created before the `meta` table existed.
const LEGACY_VERSION: &str = "0.3.10";

const CREATE_NOTE: &str = r#"
    CREATE TABLE note (
        rowid          INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid4          TEXT NOT NULL UNIQUE,
        title          TEXT NOT NULL,
        url            TEXT NOT NULL,
        tags           TEXT NOT NULL,
        description    TEXT NOT NULL,
        comments       TEXT NOT NULL,
        annotations    TEXT NOT NULL,
        created_at     TEXT NOT NULL,
        is_public      BOOLEAN NOT NULL DEFAULT 0
    )
"#;

const CREATE_META: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        meta_key       TEXT PRIMARY KEY,
        meta_value     TEXT NOT NULL
    )
"#;

#[derive(Debug, Clone, Copy)]
enum Step {
    /// 0.4.0: move the rowid-keyed table aside and create the uuid4-keyed one.
    UuidSchema,
    /// 0.4.1: copy legacy rows over with fresh uuid4 values.
    UuidBackfill,
    /// 0.5.0: the Scuttlebutt bookkeeping table is gone.
    DropSsb,
    /// 0.6.0: one canonical `created_at` format.
    Timestamps,
}

fn steps() -> Vec<(Version, Step)> {
    vec![
        (Version::new(0, 4, 0), Step::UuidSchema),
        (Version::new(0, 4, 1), Step::UuidBackfill),
        (Version::new(0, 5, 0), Step::DropSsb),
        (Version::new(0, 6, 0), Step::Timestamps),
    ]
}

/// CLI entry point for `localnative init`.
pub async fn run_migrations(config: &Config) -> Result<String> {
    let pool = db::connect(config).await?;
    let version = upgrade(&pool).await?;
    pool.close().await;
    Ok(version)
}

/// Creates or upgrades the schema and returns the resulting version.
pub async fn upgrade(pool: &SqlitePool) -> Result<String> {
    if !table_exists(pool, "note").await? {
        init_schema(pool).await?;
        info!("created schema {}", SCHEMA_VERSION);
        return Ok(SCHEMA_VERSION.to_string());
    }

    let current = Version::parse(&meta_version(pool).await?)?;
    for (version, step) in steps() {
        if current < version {
            info!("upgrading schema to {} ({:?})", version, step);
            let mut tx = pool.begin().await?;
            apply(&mut tx, step).await?;
            set_meta_version(&mut tx, &version.to_string()).await?;
            tx.commit().await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_note_created_at ON note(created_at)")
        .execute(pool)
        .await?;

    meta_version(pool).await
}

/// Reads `meta.version`, defaulting to the pre-versioning release.
pub async fn meta_version(pool: &SqlitePool) -> Result<String> {
    if !table_exists(pool, "meta").await? {
        return Ok(LEGACY_VERSION.to_string());
    }
    let version: Option<String> =
        sqlx::query_scalar("SELECT meta_value FROM meta WHERE meta_key = 'version'")
            .fetch_optional(pool)
            .await?;
    Ok(version.unwrap_or_else(|| LEGACY_VERSION.to_string()))
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(CREATE_NOTE).execute(&mut *tx).await?;
    sqlx::query(CREATE_META).execute(&mut *tx).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_note_created_at ON note(created_at)")
        .execute(&mut *tx)
        .await?;
    set_meta_version(&mut tx, SCHEMA_VERSION).await?;
    tx.commit().await?;
    Ok(())
}

async fn set_meta_version(conn: &mut SqliteConnection, version: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO meta (meta_key, meta_value) VALUES ('version', ?)")
        .bind(version)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn apply(conn: &mut SqliteConnection, step: Step) -> Result<()> {
    match step {
        Step::UuidSchema => {
            sqlx::query("ALTER TABLE note RENAME TO _note_0_3")
                .execute(&mut *conn)
                .await?;
            sqlx::query(CREATE_NOTE).execute(&mut *conn).await?;
            sqlx::query(CREATE_META).execute(&mut *conn).await?;
        }
        Step::UuidBackfill => backfill_uuid4(conn).await?,
        Step::DropSsb => {
            sqlx::query("DROP TABLE IF EXISTS ssb")
                .execute(&mut *conn)
                .await?;
        }
        Step::Timestamps => normalize_timestamps(conn).await?,
    }
    Ok(())
}

async fn backfill_uuid4(conn: &mut SqliteConnection) -> Result<()> {
    let legacy: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = '_note_0_3'",
    )
    .fetch_one(&mut *conn)
    .await?;
    if !legacy {
        return Ok(());
    }

    let rows = sqlx::query(
        "SELECT title, url, tags, description, comments, annotations, created_at, is_public \
         FROM _note_0_3 ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;
    debug!("backfilling uuid4 for {} legacy notes", rows.len());

    for row in &rows {
        sqlx::query(
            "INSERT INTO note (uuid4, title, url, tags, description, comments, annotations, created_at, is_public) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(row.get::<String, _>("title"))
        .bind(row.get::<String, _>("url"))
        .bind(row.get::<String, _>("tags"))
        .bind(row.get::<String, _>("description"))
        .bind(row.get::<String, _>("comments"))
        .bind(row.get::<Vec<u8>, _>("annotations"))
        .bind(row.get::<String, _>("created_at"))
        .bind(row.get::<bool, _>("is_public"))
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("DROP TABLE _note_0_3")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn normalize_timestamps(conn: &mut SqliteConnection) -> Result<()> {
    let rows = sqlx::query("SELECT rowid, created_at FROM note")
        .fetch_all(&mut *conn)
        .await?;

    let mut rewritten = 0usize;
    for row in &rows {
        let rowid: i64 = row.get("rowid");
        let created_at: String = row.get("created_at");
        if let Some(canonical) = canonical_created_at(&created_at) {
            if canonical != created_at {
                sqlx::query("UPDATE note SET created_at = ? WHERE rowid = ?")
                    .bind(&canonical)
                    .bind(rowid)
                    .execute(&mut *conn)
                    .await?;
                rewritten += 1;
            }
        }
    }
    debug!("normalized {} of {} timestamps", rewritten, rows.len());
    Ok(())
}

/// Maps any historical `created_at` spelling onto [`TIMESTAMP_FORMAT`].
///
/// Old releases wrote `YYYY-MM-DD HH:MM:SS:<nanos> UTC` where `<nanos>` is an
/// unpadded integer; later ones wrote chrono's `YYYY-MM-DD HH:MM:SS.fff UTC`.
/// Returns `None` for anything unrecognised, which is then left untouched.
fn canonical_created_at(raw: &str) -> Option<String> {
    let s = raw.trim().trim_end_matches(" UTC");

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() == 4 {
        let base = NaiveDateTime::parse_from_str(&parts[..3].join(":"), "%Y-%m-%d %H:%M:%S").ok()?;
        let nanos: u32 = parts[3].parse().ok()?;
        let dt = base.with_nanosecond(nanos).unwrap_or(base);
        return Some(dt.format(TIMESTAMP_FORMAT).to_string());
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_colon_nanos() {
        assert_eq!(
            canonical_created_at("2019-03-04 05:06:07:5000 UTC").as_deref(),
            Some("2019-03-04 05:06:07.000005000")
        );
    }

    #[test]
    fn test_chrono_display_form() {
        assert_eq!(
            canonical_created_at("2023-11-12 13:14:15.123456789 UTC").as_deref(),
            Some("2023-11-12 13:14:15.123456789")
        );
    }

    #[test]
    fn test_canonical_is_fixed_point() {
        let c = "2023-11-12 13:14:15.000000001";
        assert_eq!(canonical_created_at(c).as_deref(), Some(c));
    }

    #[test]
    fn test_garbage_left_alone() {
        assert_eq!(canonical_created_at("yesterday"), None);
    }
}
