//! JSON command protocol.
//!
//! Every host (iOS and Android through the C ABI, the browser extension
//! through native messaging, the CLI through `localnative run`) talks to the
//! store with a single JSON object tagged by `"action"`:
//!
//! ```json
//! { "action": "search", "query": "rust sqlite", "limit": 10, "offset": 0 }
//! ```
//!
//! Responses are JSON as well. Failures of any kind come back as
//! `{"error": "<message>"}`; [`run`] never panics on bad input.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::NewNote;
use crate::{attach, client, db, migrate, notes, query, server};

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Cmd {
    Insert(CmdInsert),
    InsertImage(CmdInsert),
    Delete(CmdDelete),
    Select(CmdSelect),
    Search(CmdSearch),
    Filter(CmdFilter),
    Upgrade,
    SyncViaAttach(CmdSyncViaAttach),
    Server(CmdAddr),
    ClientSync(CmdAddr),
    ClientStopServer(CmdAddr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdInsert {
    #[serde(flatten)]
    pub note: NewNote,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdDelete {
    pub rowid: i64,
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdSelect {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdSearch {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdFilter {
    #[serde(default)]
    pub query: String,
    pub from: String,
    pub to: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdSyncViaAttach {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdAddr {
    pub addr: String,
}

/// Renders an error the way every host expects it.
pub fn error_json(message: impl std::fmt::Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

/// Synchronous entry point against the default database location.
pub fn run(text: &str) -> String {
    run_with_config(&Config::minimal(), text)
}

/// Synchronous entry point: parses, executes and renders one command on a
/// fresh current-thread runtime.
pub fn run_with_config(config: &Config, text: &str) -> String {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return error_json(format!("runtime: {}", e)),
    };
    runtime.block_on(run_async(config, text))
}

/// Async entry point for callers that already own a runtime.
pub async fn run_async(config: &Config, text: &str) -> String {
    let cmd = match parse(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("rejecting command: {}", e);
            return error_json(e);
        }
    };
    debug!("process cmd {:?}", cmd);

    let pool = match db::open(config).await {
        Ok(pool) => pool,
        Err(e) => return error_json(e),
    };
    let response = match process(&pool, config, cmd).await {
        Ok(value) => value.to_string(),
        Err(e) => {
            warn!("command failed: {}", e);
            error_json(e)
        }
    };
    pool.close().await;
    response
}

pub fn parse(text: &str) -> Result<Cmd> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let action = value
        .get("action")
        .and_then(|a| a.as_str())
        .ok_or_else(|| Error::InvalidCommand("missing \"action\"".to_string()))?
        .to_string();
    serde_json::from_value(value).map_err(|e| Error::InvalidCommand(format!("{}: {}", action, e)))
}

/// Executes a parsed command against an open, upgraded pool.
pub async fn process(pool: &SqlitePool, config: &Config, cmd: Cmd) -> Result<serde_json::Value> {
    let value = match cmd {
        Cmd::Insert(i) => {
            notes::insert(pool, &i.note).await?;
            serde_json::to_value(query::select(pool, i.limit, i.offset).await?)?
        }
        Cmd::InsertImage(i) => {
            notes::insert_image(pool, &i.note).await?;
            serde_json::to_value(query::select(pool, i.limit, i.offset).await?)?
        }
        Cmd::Delete(d) => {
            notes::delete(pool, d.rowid).await?;
            serde_json::to_value(query::search(pool, &d.query, d.limit, d.offset).await?)?
        }
        Cmd::Select(s) => serde_json::to_value(query::select(pool, s.limit, s.offset).await?)?,
        Cmd::Search(s) => {
            serde_json::to_value(query::search(pool, &s.query, s.limit, s.offset).await?)?
        }
        Cmd::Filter(f) => serde_json::to_value(
            query::filter(pool, &f.query, &f.from, &f.to, f.limit, f.offset).await?,
        )?,
        Cmd::Upgrade => {
            let version = migrate::upgrade(pool).await?;
            json!({ "upgrade-done": version })
        }
        Cmd::SyncViaAttach(s) => {
            let report = attach::sync_via_attach(pool, &s.uri).await?;
            info!("sync-via-attach {}: {:?}", s.uri, report);
            json!({ "sync-via-attach-done": s.uri })
        }
        Cmd::Server(s) => {
            let mut cfg = config.clone();
            cfg.server.bind = s.addr;
            server::run_server(&cfg, pool.clone()).await?;
            json!({ "server": "stopped" })
        }
        Cmd::ClientSync(s) => {
            let report = client::sync(pool, &s.addr).await?;
            json!({ "client-sync": report })
        }
        Cmd::ClientStopServer(s) => {
            client::stop_server(&s.addr).await?;
            json!({ "client-stop-server": "ok" })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_defaults() {
        match parse(r#"{"action":"search","query":"x"}"#).unwrap() {
            Cmd::Search(s) => {
                assert_eq!(s.query, "x");
                assert_eq!(s.limit, 10);
                assert_eq!(s.offset, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_flattens_note() {
        let cmd = parse(
            r#"{"action":"insert","title":"t","url":"u","tags":"a b","description":"",
                "comments":"","annotations":"","limit":5,"offset":0,"is_public":true}"#,
        )
        .unwrap();
        match cmd {
            Cmd::Insert(i) => {
                assert_eq!(i.note.title, "t");
                assert_eq!(i.note.tags, "a b");
                assert!(i.note.is_public);
                assert_eq!(i.limit, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_kebab_case_actions() {
        assert!(matches!(
            parse(r#"{"action":"sync-via-attach","uri":"/tmp/a"}"#).unwrap(),
            Cmd::SyncViaAttach(_)
        ));
        assert!(matches!(
            parse(r#"{"action":"client-stop-server","addr":"127.0.0.1:1"}"#).unwrap(),
            Cmd::ClientStopServer(_)
        ));
        assert!(matches!(parse(r#"{"action":"upgrade"}"#).unwrap(), Cmd::Upgrade));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("not json"), Err(Error::Json(_))));
        assert!(matches!(parse(r#"{"query":"x"}"#), Err(Error::InvalidCommand(_))));
        let err = parse(r#"{"action":"fly"}"#).unwrap_err();
        assert!(err.to_string().contains("fly"));
        let err = parse(r#"{"action":"filter","query":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("filter"));
    }

    #[test]
    fn test_error_json_shape() {
        let v: serde_json::Value = serde_json::from_str(&error_json("boom \"x\"")).unwrap();
        assert_eq!(v["error"], "boom \"x\"");
    }
}
