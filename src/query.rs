//! Read side: select, search and date-range filter.
//!
//! All three share one shape. A [`Criteria`] (query words plus an optional
//! inclusive day range) is rendered into a `WHERE` clause and the same
//! criteria feed the page of notes, the total count, the per-day histogram
//! and the tag counts of a [`QueryResult`].
//!
//! A note matches a query when *every* whitespace separated word occurs in
//! at least one of title, url, tags or description (`LIKE`, so ASCII case
//! insensitive). An empty query matches everything.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Day, Note, NoteRow, QueryResult, TagCount};
use crate::notes::NOTE_COLUMNS;
use crate::tags::count_tags;

const SEARCHED_COLUMNS: [&str; 4] = ["title", "url", "tags", "description"];

/// What to match: query words and an optional `[from, to]` day range.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    words: Vec<String>,
    range: Option<(String, String)>,
}

impl Criteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn search(query: &str) -> Self {
        Self {
            words: make_words(query),
            range: None,
        }
    }

    /// Search restricted to notes created on days within `[from, to]`.
    pub fn filter(query: &str, from: &str, to: &str) -> Result<Self> {
        let from = parse_day(from)?;
        let to = parse_day(to)?;
        Ok(Self {
            words: make_words(query),
            range: Some((from, to)),
        })
    }

    /// Same words, no date range.
    fn without_range(&self) -> Self {
        Self {
            words: self.words.clone(),
            range: None,
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if self.words.is_empty() && self.range.is_none() {
            return;
        }
        qb.push(" WHERE ");
        let mut first = true;
        if let Some((from, to)) = &self.range {
            qb.push("substr(created_at, 1, 10) >= ")
                .push_bind(from.clone())
                .push(" AND substr(created_at, 1, 10) <= ")
                .push_bind(to.clone());
            first = false;
        }
        for word in &self.words {
            if !first {
                qb.push(" AND ");
            }
            first = false;
            qb.push("(");
            for (i, column) in SEARCHED_COLUMNS.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(*column)
                    .push(" LIKE ")
                    .push_bind(like_pattern(word))
                    .push(" ESCAPE '\\'");
            }
            qb.push(")");
        }
    }
}

/// Splits a query on whitespace.
fn make_words(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_string).collect()
}

/// `%word%` with LIKE metacharacters matched literally.
fn like_pattern(word: &str) -> String {
    let mut pattern = String::with_capacity(word.len() + 2);
    pattern.push('%');
    for c in word.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn parse_day(s: &str) -> Result<String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| Error::InvalidDate(s.to_string()))
}

pub async fn select(pool: &SqlitePool, limit: u32, offset: u32) -> Result<QueryResult> {
    run(pool, &Criteria::all(), limit, offset).await
}

pub async fn search(pool: &SqlitePool, query: &str, limit: u32, offset: u32) -> Result<QueryResult> {
    run(pool, &Criteria::search(query), limit, offset).await
}

/// Date-range search. `days` deliberately ignores the range so a timeline
/// chart keeps showing every day that matches the query.
pub async fn filter(
    pool: &SqlitePool,
    query: &str,
    from: &str,
    to: &str,
    limit: u32,
    offset: u32,
) -> Result<QueryResult> {
    let criteria = Criteria::filter(query, from, to)?;
    Ok(QueryResult {
        count: count(pool, &criteria).await?,
        notes: notes(pool, &criteria, limit, offset).await?,
        days: by_day(pool, &criteria.without_range()).await?,
        tags: by_tag(pool, &criteria).await?,
    })
}

async fn run(pool: &SqlitePool, criteria: &Criteria, limit: u32, offset: u32) -> Result<QueryResult> {
    Ok(QueryResult {
        count: count(pool, criteria).await?,
        notes: notes(pool, criteria, limit, offset).await?,
        days: by_day(pool, criteria).await?,
        tags: by_tag(pool, criteria).await?,
    })
}

pub async fn count(pool: &SqlitePool, criteria: &Criteria) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(1) FROM note");
    criteria.push_where(&mut qb);
    debug!("count sql: {}", qb.sql());
    let n: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(n)
}

/// One page of matching notes, newest first.
pub async fn notes(
    pool: &SqlitePool,
    criteria: &Criteria,
    limit: u32,
    offset: u32,
) -> Result<Vec<Note>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM note", NOTE_COLUMNS));
    criteria.push_where(&mut qb);
    qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
        .push_bind(i64::from(limit))
        .push(" OFFSET ")
        .push_bind(i64::from(offset));
    debug!("notes sql: {}", qb.sql());

    let rows: Vec<NoteRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(Note::from).collect())
}

/// Per-day note counts in ascending date order.
pub async fn by_day(pool: &SqlitePool, criteria: &Criteria) -> Result<Vec<Day>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT substr(created_at, 1, 10) AS date, COUNT(1) AS count FROM note",
    );
    criteria.push_where(&mut qb);
    qb.push(" GROUP BY date ORDER BY date");
    let days: Vec<Day> = qb.build_query_as().fetch_all(pool).await?;
    Ok(days)
}

pub async fn by_tag(pool: &SqlitePool, criteria: &Criteria) -> Result<Vec<TagCount>> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT tags FROM note");
    criteria.push_where(&mut qb);
    let rows = qb.build().fetch_all(pool).await?;
    Ok(count_tags(rows.iter().map(|r| r.get::<String, _>("tags"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_words_collapses_whitespace() {
        assert_eq!(make_words("  rust \t sqlite\n"), vec!["rust", "sqlite"]);
        assert!(make_words("   ").is_empty());
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_where_clause_shape() {
        let criteria = Criteria::filter("a b", "2024-01-01", "2024-01-31").unwrap();
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1 FROM note");
        criteria.push_where(&mut qb);
        let sql = qb.sql().to_string();
        assert!(sql.contains("substr(created_at, 1, 10) >= ?"));
        assert_eq!(sql.matches(" LIKE ").count(), 8);
        assert_eq!(sql.matches(") AND (").count(), 1);
    }

    #[test]
    fn test_empty_criteria_has_no_where() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1 FROM note");
        Criteria::search("  ").push_where(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1 FROM note");
    }

    #[test]
    fn test_invalid_day_rejected() {
        let err = Criteria::filter("", "2024-13-01", "2024-12-31").unwrap_err();
        assert!(matches!(err, Error::InvalidDate(_)));
    }
}
