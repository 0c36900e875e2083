//! Library error type.
//!
//! Every fallible operation in the library returns [`Result`]. The JSON
//! protocol and the C ABI render these errors as `{"error": "<message>"}`,
//! so the `Display` text of each variant is what hosts end up showing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("version parse error: {0}")]
    Semver(#[from] semver::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("VERSION_NOT_MATCH: local {local}, remote {remote}")]
    VersionMismatch { local: String, remote: String },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("server error ({status}): {message}")]
    Remote { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
