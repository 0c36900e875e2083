//! Database statistics overview.
//!
//! Used by `localnative stats` to give a quick picture of what is stored:
//! note count, date span, public share and the most used tags.

use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::Result;
use crate::migrate;
use crate::query::{self, Criteria};

const TOP_TAGS: usize = 10;

pub struct Stats {
    pub version: String,
    pub notes: i64,
    pub public_notes: i64,
    pub first_day: Option<String>,
    pub last_day: Option<String>,
    pub top_tags: Vec<(String, i64)>,
}

pub async fn collect(pool: &SqlitePool) -> Result<Stats> {
    let version = migrate::meta_version(pool).await?;
    let notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note")
        .fetch_one(pool)
        .await?;
    let public_notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note WHERE is_public = 1")
        .fetch_one(pool)
        .await?;

    let days = query::by_day(pool, &Criteria::all()).await?;
    let top_tags = query::by_tag(pool, &Criteria::all())
        .await?
        .into_iter()
        .take(TOP_TAGS)
        .map(|t| (t.tag, t.count))
        .collect();

    Ok(Stats {
        version,
        notes,
        public_notes,
        first_day: days.first().map(|d| d.date.clone()),
        last_day: days.last().map(|d| d.date.clone()),
        top_tags,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config, pool: &SqlitePool) -> Result<()> {
    let stats = collect(pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("LocalNative Database Stats");
    println!("==========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Schema:      {}", stats.version);
    println!();
    println!("  Notes:       {}", stats.notes);
    println!("  Public:      {}", stats.public_notes);
    if let (Some(first), Some(last)) = (&stats.first_day, &stats.last_day) {
        println!("  Span:        {} .. {}", first, last);
    }

    if !stats.top_tags.is_empty() {
        println!();
        println!("  Top tags:");
        println!("  {:<32} {:>6}", "TAG", "NOTES");
        println!("  {}", "-".repeat(40));
        for (tag, count) in &stats.top_tags {
            println!("  {:<32} {:>6}", tag, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
