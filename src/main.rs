//! # LocalNative CLI (`localnative`)
//!
//! Desktop front end to the note store. Every data command prints the same
//! JSON the mobile and browser hosts receive, so the CLI doubles as a way to
//! exercise the command protocol by hand.
//!
//! ## Usage
//!
//! ```bash
//! localnative --config ./config/localnative.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `localnative init` | Create the database and upgrade its schema |
//! | `localnative insert` | Add a note |
//! | `localnative image <file>` | Add a PNG screenshot as a note |
//! | `localnative select` | Newest notes, paged |
//! | `localnative search "<words>"` | Notes matching every word |
//! | `localnative filter <from> <to>` | Search restricted to a day range |
//! | `localnative delete <rowid>` | Remove a note |
//! | `localnative upgrade` | Run pending schema upgrades |
//! | `localnative attach <file>` | Two-way merge with another database file |
//! | `localnative serve` | Run the peer sync server |
//! | `localnative sync <addr>` | Two-way sync with a peer server |
//! | `localnative stop-server <addr>` | Stop a peer sync server |
//! | `localnative run '<json>'` | Run one raw protocol command |
//! | `localnative web-ext-host` | Browser native-messaging host on stdio |
//! | `localnative stats` | Database summary |
//! | `localnative export` | All notes as JSON |

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use localnative_core::cmd::{
    self, Cmd, CmdAddr, CmdDelete, CmdFilter, CmdInsert, CmdSearch, CmdSelect, CmdSyncViaAttach,
};
use localnative_core::config::{self, Config};
use localnative_core::models::{NewNote, PNG_DATA_URL_PREFIX};
use localnative_core::{db, export, migrate, server, stats, web_ext};

/// LocalNative CLI: a local-first store for bookmarks and screenshots.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used and the
/// database lives at the platform location (or `$LOCALNATIVE_DB`).
#[derive(Parser)]
#[command(name = "localnative", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/localnative.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the database file and bring its schema up to date.
    ///
    /// Idempotent; running it on an existing store only applies pending
    /// upgrades.
    Init,

    /// Add a note and print the first page of notes.
    Insert {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        url: String,
        /// Tags separated by commas or whitespace.
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        comments: String,
        #[arg(long)]
        public: bool,
    },

    /// Add a PNG image as a note.
    Image {
        /// PNG file to store.
        file: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List the newest notes.
    Select {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Notes whose title, url, tags or description contain every word.
    Search {
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Search restricted to notes created between two days (YYYY-MM-DD).
    Filter {
        from: String,
        to: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Delete a note by rowid.
    Delete { rowid: i64 },

    /// Apply pending schema upgrades.
    Upgrade,

    /// Two-way merge with another LocalNative database file.
    Attach { file: PathBuf },

    /// Run the peer sync server until a client stops it.
    Serve {
        /// Overrides `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Two-way sync with a peer sync server (`host:port`).
    Sync { addr: String },

    /// Ask a peer sync server to shut down.
    StopServer { addr: String },

    /// Run one raw JSON protocol command and print the response.
    Run { json: String },

    /// Serve the browser extension over native messaging on stdio.
    WebExtHost,

    /// Print a summary of the database.
    Stats,

    /// Export all notes as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "localnative_core=info,localnative=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn page_limit(cfg: &Config, limit: Option<u32>) -> u32 {
    limit.unwrap_or(cfg.query.default_limit)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    let cmd = match cli.command {
        Commands::Init => {
            let version = migrate::run_migrations(&cfg).await?;
            println!(
                "Database initialized at {} (schema {}).",
                cfg.db.path.display(),
                version
            );
            return Ok(());
        }
        Commands::Run { json } => {
            println!("{}", cmd::run_async(&cfg, &json).await);
            return Ok(());
        }
        Commands::WebExtHost => {
            let handled = tokio::task::spawn_blocking(move || web_ext::run_stdio(&cfg)).await??;
            tracing::debug!("handled {} messages", handled);
            return Ok(());
        }
        Commands::Serve { bind } => {
            let mut cfg = cfg;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let pool = db::open(&cfg).await?;
            server::run_server(&cfg, pool).await?;
            return Ok(());
        }
        Commands::Stats => {
            let pool = db::open(&cfg).await?;
            stats::run_stats(&cfg, &pool).await?;
            return Ok(());
        }
        Commands::Export { output } => {
            let pool = db::open(&cfg).await?;
            export::run_export(&pool, output.as_deref()).await?;
            return Ok(());
        }
        Commands::Insert {
            title,
            url,
            tags,
            description,
            comments,
            public,
        } => Cmd::Insert(CmdInsert {
            note: NewNote {
                title,
                url,
                tags,
                description,
                comments,
                annotations: String::new(),
                is_public: public,
            },
            limit: cfg.query.default_limit,
            offset: 0,
        }),
        Commands::Image {
            file,
            title,
            tags,
            description,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read image: {}", file.display()))?;
            let annotations = format!(
                "{}{}",
                PNG_DATA_URL_PREFIX,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            );
            Cmd::InsertImage(CmdInsert {
                note: NewNote {
                    title,
                    url: String::new(),
                    tags,
                    description,
                    comments: String::new(),
                    annotations,
                    is_public: false,
                },
                limit: cfg.query.default_limit,
                offset: 0,
            })
        }
        Commands::Select { limit, offset } => Cmd::Select(CmdSelect {
            limit: page_limit(&cfg, limit),
            offset,
        }),
        Commands::Search {
            query,
            limit,
            offset,
        } => Cmd::Search(CmdSearch {
            query,
            limit: page_limit(&cfg, limit),
            offset,
        }),
        Commands::Filter {
            from,
            to,
            query,
            limit,
            offset,
        } => Cmd::Filter(CmdFilter {
            query,
            from,
            to,
            limit: page_limit(&cfg, limit),
            offset,
        }),
        Commands::Delete { rowid } => Cmd::Delete(CmdDelete {
            rowid,
            query: String::new(),
            limit: cfg.query.default_limit,
            offset: 0,
        }),
        Commands::Upgrade => Cmd::Upgrade,
        Commands::Attach { file } => Cmd::SyncViaAttach(CmdSyncViaAttach {
            uri: file.to_string_lossy().into_owned(),
        }),
        Commands::Sync { addr } => Cmd::ClientSync(CmdAddr { addr }),
        Commands::StopServer { addr } => Cmd::ClientStopServer(CmdAddr { addr }),
    };

    let pool = db::open(&cfg).await?;
    let result = cmd::process(&pool, &cfg, cmd).await;
    pool.close().await;
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
