//! Peer sync client, the counterpart of [`crate::server`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::migrate;
use crate::models::SyncNote;
use crate::notes;
use crate::server::{Candidates, SendNoteResponse, VersionRequest, VersionResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Notes pushed to the server.
    pub sent: usize,
    /// Notes pulled from the server.
    pub received: usize,
}

/// Accepts `host:port` with or without a scheme.
fn base_url(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

struct SyncClient {
    http: reqwest::Client,
    base: String,
}

impl SyncClient {
    fn new(addr: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base: base_url(addr),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<R>().await?);
    }
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("request failed")
        .to_string();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(message));
    }
    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Two-way sync with the server at `addr`.
///
/// Fails with [`Error::VersionMismatch`] before touching any data when the
/// two schema versions differ.
pub async fn sync(pool: &SqlitePool, addr: &str) -> Result<SyncReport> {
    let client = SyncClient::new(addr)?;

    let local_version = migrate::meta_version(pool).await?;
    let check: VersionResponse = client
        .post(
            "/sync/version",
            &VersionRequest {
                version: local_version.clone(),
            },
        )
        .await?;
    debug!("version match: {}", check.matched);
    if !check.matched {
        return Err(Error::VersionMismatch {
            local: local_version,
            remote: check.version,
        });
    }

    let candidates = notes::uuid4_list(pool).await?;

    let to_server: Vec<String> = client
        .post(
            "/sync/diff-to-server",
            &Candidates {
                candidates: candidates.clone(),
            },
        )
        .await?;
    debug!("{} notes to send", to_server.len());

    let mut report = SyncReport::default();
    for uuid4 in &to_server {
        let note = SyncNote::from(notes::get_row_by_uuid4(pool, uuid4).await?);
        let resp: SendNoteResponse = client.post("/notes", &note).await?;
        if resp.inserted {
            report.sent += 1;
        }
    }

    let from_server: Vec<String> = client
        .post("/sync/diff-from-server", &Candidates { candidates })
        .await?;
    debug!("{} notes to receive", from_server.len());

    for uuid4 in &from_server {
        let note: SyncNote = client.get(&format!("/notes/{}", uuid4)).await?;
        if notes::insert_synced(pool, &note).await? {
            report.received += 1;
        }
    }

    info!(
        "sync with {} done: sent {}, received {}",
        addr, report.sent, report.received
    );
    Ok(report)
}

/// Asks the server at `addr` to shut down.
pub async fn stop_server(addr: &str) -> Result<()> {
    let client = SyncClient::new(addr)?;
    let _: serde_json::Value = client.post("/stop", &serde_json::json!({})).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("192.168.1.2:3456"), "http://192.168.1.2:3456");
        assert_eq!(base_url("http://h:1/"), "http://h:1");
        assert_eq!(base_url(" https://h:1 "), "https://h:1");
    }
}
