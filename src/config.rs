use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default database location.
pub const DB_ENV_VAR: &str = "LOCALNATIVE_DB";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3456".to_string()
}
fn default_limit() -> u32 {
    10
}

/// Platform database location, overridable with `$LOCALNATIVE_DB`.
///
/// iOS apps may only write below their sandboxed `Documents` directory, so
/// the store lives there; everywhere else it goes to `~/LocalNative`.
pub fn default_db_path() -> PathBuf {
    if let Some(p) = std::env::var_os(DB_ENV_VAR) {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    let dir_name = if cfg!(target_os = "ios") {
        "Documents"
    } else {
        "LocalNative"
    };
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(dir_name).join("localnative.sqlite3")
}

impl Config {
    /// Configuration used when no config file exists: every section takes
    /// its default, the database path honours `$LOCALNATIVE_DB`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            server: ServerConfig::default(),
            query: QueryConfig::default(),
        }
    }

    /// Minimal configuration pointing at an explicit database file.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        let mut cfg = Self::minimal();
        cfg.db.path = path.into();
        cfg
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.query.default_limit == 0 {
        anyhow::bail!("query.default_limit must be >= 1");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

/// Loads `path` if it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_when_missing() {
        let cfg: Config = toml::from_str("[db]\npath = \"/tmp/x.sqlite3\"\n").unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("/tmp/x.sqlite3"));
        assert_eq!(cfg.server.bind, "0.0.0.0:3456");
        assert_eq!(cfg.query.default_limit, 10);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ln.toml");
        std::fs::write(&path, "[query]\ndefault_limit = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:3456");
    }
}
