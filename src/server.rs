//! Peer sync server.
//!
//! A device that wants to receive a sync runs this server; another device
//! runs [`crate::client::sync`] against it. Notes are reconciled by `uuid4`
//! in both directions, never updated or deleted.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns crate version) |
//! | `POST` | `/sync/version` | Does the caller's schema version match ours |
//! | `POST` | `/sync/diff-to-server` | Which of the caller's uuids are missing here |
//! | `POST` | `/sync/diff-from-server` | Which of our uuids the caller is missing |
//! | `POST` | `/notes` | Store a note sent by the caller |
//! | `GET`  | `/notes/{uuid4}` | Fetch one note |
//! | `POST` | `/stop` | Graceful shutdown |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "not found: note 1234" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::SyncNote;
use crate::notes;

#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    shutdown: Arc<Notify>,
}

/// Binds `[server].bind` and serves until `/stop` is called.
pub async fn run_server(config: &Config, pool: SqlitePool) -> Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, pool).await
}

/// Serves on an already bound listener until `/stop` is called.
pub async fn serve(listener: TcpListener, pool: SqlitePool) -> Result<()> {
    let shutdown = Arc::new(Notify::new());
    let state = AppState {
        pool,
        shutdown: shutdown.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/sync/version", post(handle_version))
        .route("/sync/diff-to-server", post(handle_diff_to_server))
        .route("/sync/diff-from-server", post(handle_diff_from_server))
        .route("/notes", post(handle_send_note))
        .route("/notes/{uuid4}", get(handle_receive_note))
        .route("/stop", post(handle_stop))
        .layer(cors)
        .with_state(state);

    info!("sync server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    info!("sync server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Base64(_) | Error::Json(_) | Error::InvalidCommand(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            warn!("sync request failed: {}", err);
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Unwraps a JSON body, turning axum's plain-text rejections into the JSON
/// error contract.
fn json_body<T>(
    payload: std::result::Result<Json<T>, JsonRejection>,
) -> std::result::Result<T, AppError> {
    payload.map(|Json(value)| value).map_err(AppError::from)
}

// ============ Wire types ============

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct VersionRequest {
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct VersionResponse {
    pub matched: bool,
    /// The server's schema version.
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct Candidates {
    pub candidates: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SendNoteResponse {
    pub inserted: bool,
}

// ============ Handlers ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_version(
    State(state): State<AppState>,
    payload: std::result::Result<Json<VersionRequest>, JsonRejection>,
) -> std::result::Result<Json<VersionResponse>, AppError> {
    let req = json_body(payload)?;
    let version = migrate::meta_version(&state.pool).await?;
    let matched = version == req.version;
    debug!("version check: ours {}, theirs {}", version, req.version);
    Ok(Json(VersionResponse { matched, version }))
}

async fn handle_diff_to_server(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Candidates>, JsonRejection>,
) -> std::result::Result<Json<Vec<String>>, AppError> {
    let req = json_body(payload)?;
    Ok(Json(missing_here(&state.pool, req.candidates).await?))
}

async fn handle_diff_from_server(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Candidates>, JsonRejection>,
) -> std::result::Result<Json<Vec<String>>, AppError> {
    let req = json_body(payload)?;
    Ok(Json(missing_there(&state.pool, req.candidates).await?))
}

async fn handle_send_note(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SyncNote>, JsonRejection>,
) -> std::result::Result<Json<SendNoteResponse>, AppError> {
    let note = json_body(payload)?;
    let inserted = notes::insert_synced(&state.pool, &note).await?;
    debug!("received note {} (inserted: {})", note.uuid4, inserted);
    Ok(Json(SendNoteResponse { inserted }))
}

async fn handle_receive_note(
    State(state): State<AppState>,
    Path(uuid4): Path<String>,
) -> std::result::Result<Json<SyncNote>, AppError> {
    let row = notes::get_row_by_uuid4(&state.pool, &uuid4).await?;
    Ok(Json(SyncNote::from(row)))
}

async fn handle_stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    info!("stop requested");
    state.shutdown.notify_one();
    Json(serde_json::json!({ "stopping": true }))
}

/// Candidates this store does not have, in the caller's order.
pub async fn missing_here(pool: &SqlitePool, candidates: Vec<String>) -> Result<Vec<String>> {
    let ours: HashSet<String> = notes::uuid4_list(pool).await?.into_iter().collect();
    Ok(candidates
        .into_iter()
        .filter(|u| !ours.contains(u))
        .collect())
}

/// Notes of this store missing from `candidates`, in insertion order.
pub async fn missing_there(pool: &SqlitePool, candidates: Vec<String>) -> Result<Vec<String>> {
    let theirs: HashSet<String> = candidates.into_iter().collect();
    Ok(notes::uuid4_list(pool)
        .await?
        .into_iter()
        .filter(|u| !theirs.contains(u))
        .collect())
}
