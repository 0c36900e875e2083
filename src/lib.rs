//! # LocalNative core
//!
//! A local-first note store for web bookmarks and images, shared by every
//! LocalNative host: the iOS and Android apps through a C ABI, the browser
//! extension through native messaging, and the `localnative` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ C ABI / stdio│──▶│ JSON command │──▶│  SQLite  │
//! │  / CLI       │   │   protocol   │   │ note+meta│
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │
//!                       ┌────────────────────┤
//!                       ▼                    ▼
//!                 ┌──────────┐        ┌─────────────┐
//!                 │  attach  │        │ HTTP server │
//!                 │  merge   │        │  + client   │
//!                 └──────────┘        └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! localnative init
//! localnative insert --title "Rust" --url https://www.rust-lang.org --tags "lang rust"
//! localnative search rust
//! localnative run '{"action":"select","limit":10,"offset":0}'
//! localnative serve --bind 0.0.0.0:3456      # on one device
//! localnative sync 192.168.1.2:3456          # on another
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`cmd`] | JSON command protocol |
//! | [`ffi`] | C ABI for mobile hosts |
//! | [`web_ext`] | Browser native-messaging host |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and version upgrades |
//! | [`models`] | Core data types |
//! | [`tags`] | Tag normalization and counting |
//! | [`notes`] | Note insert, delete and lookup |
//! | [`query`] | Paged select, search and date filter |
//! | [`attach`] | Merge with another database file |
//! | [`server`] | Peer sync HTTP server |
//! | [`client`] | Peer sync HTTP client |
//! | [`stats`] | Database statistics |
//! | [`export`] | JSON export |
//! | [`error`] | Library error type |

pub mod attach;
pub mod client;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ffi;
pub mod migrate;
pub mod models;
pub mod notes;
pub mod query;
pub mod server;
pub mod stats;
pub mod tags;
pub mod web_ext;

pub use error::{Error, Result};
