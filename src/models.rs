//! Core data models.
//!
//! [`NoteRow`] is what SQLite hands back; [`Note`] is what hosts see in a
//! [`QueryResult`]; [`SyncNote`] is the lossless wire form exchanged between
//! peers during sync.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::tags::make_tags;

/// URL marker for notes whose annotations hold PNG bytes.
pub const IMAGE_PNG_URL: &str = "mime://image/png";
/// Prefix of the data URLs that carry image annotations.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
/// Canonical `created_at` format. Lexical order equals chronological order
/// and the first ten characters are the calendar day.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// A note row as stored in the `note` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NoteRow {
    pub rowid: i64,
    pub uuid4: String,
    pub title: String,
    pub url: String,
    pub tags: String,
    pub description: String,
    pub comments: String,
    pub annotations: Vec<u8>,
    pub created_at: String,
    pub is_public: bool,
}

/// A note as returned to hosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub rowid: i64,
    pub uuid4: String,
    pub title: String,
    pub url: String,
    pub tags: String,
    pub description: String,
    pub comments: String,
    pub annotations: String,
    pub created_at: String,
    pub is_public: bool,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        let annotations = render_annotations(&row.url, &row.annotations);
        Note {
            rowid: row.rowid,
            uuid4: row.uuid4,
            title: row.title,
            url: row.url,
            tags: make_tags(&row.tags),
            description: row.description,
            comments: row.comments,
            annotations,
            created_at: row.created_at,
            is_public: row.is_public,
        }
    }
}

/// Image notes come back as a `data:` URL, everything else as text.
fn render_annotations(url: &str, bytes: &[u8]) -> String {
    if url == IMAGE_PNG_URL {
        let mut s = PNG_DATA_URL_PREFIX.to_string();
        s.push_str(&STANDARD.encode(bytes));
        s
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Input for a new note, shared by the `insert` and `insert-image` commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub annotations: String,
    #[serde(default)]
    pub is_public: bool,
}

/// Lossless note representation used on the sync wire and by `export`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncNote {
    pub uuid4: String,
    pub title: String,
    pub url: String,
    pub tags: String,
    pub description: String,
    pub comments: String,
    /// Raw annotation bytes, base64 encoded.
    pub annotations: String,
    pub created_at: String,
    pub is_public: bool,
}

impl From<NoteRow> for SyncNote {
    fn from(row: NoteRow) -> Self {
        SyncNote {
            uuid4: row.uuid4,
            title: row.title,
            url: row.url,
            tags: row.tags,
            description: row.description,
            comments: row.comments,
            annotations: STANDARD.encode(&row.annotations),
            created_at: row.created_at,
            is_public: row.is_public,
        }
    }
}

/// Number of notes created on one day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Day {
    pub date: String,
    pub count: i64,
}

/// Number of notes carrying one tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// Response shape of `select`, `search`, `filter`, `insert` and `delete`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub count: i64,
    pub notes: Vec<Note>,
    pub days: Vec<Day>,
    pub tags: Vec<TagCount>,
}
