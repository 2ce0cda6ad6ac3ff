//! # QrShare Server Library
//!
//! This crate provides the server side of QrShare: it shares a set of local
//! files and directories over HTTP so that any browser on the same network
//! can browse, download, and upload, after scanning a QR code printed in the
//! terminal.
//!
//! ## Overview
//!
//! - **Path Sandbox**: Confine every client path to the share root
//! - **Directory Walker**: Link-following traversal that survives link cycles
//! - **Archive Streamer**: Zip any file or directory on the fly
//! - **Chunked Uploads**: Stateless, resumable, per-file serialized uploads
//! - **HTTP API**: axum router with token, cookie, and basic authentication
//! - **Console UI**: Access URLs and their QR codes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     HTTP router                          │
//! │        read-only gate → auth → handlers                  │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │   Chunked    │  │  Directory   │  │   Archive    │   │
//! │  │   Uploads    │  │   Walker     │──▶   Streamer   │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────┘   │
//! │         │                 │                              │
//! │  ┌──────▼─────────────────▼──────────────────────────┐  │
//! │  │                  Path Sandbox                      │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use server::{router, AppState, AuthConfig, Config, ShareRoot};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let share = ShareRoot::new(&["/srv/public".into()])?;
//!     let auth = AuthConfig::from_config(None, &[]);
//!
//!     let state = Arc::new(AppState::from_config(share.path(), &config, auth));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Sandbox, traversal, archives, uploads, file operations
//! - [`http`]: Router, middleware, handlers
//! - [`error`]: HTTP error responses
//! - [`auth`]: Access token and accounts
//! - [`share`]: Share root assembly
//! - [`network`]: Local address discovery
//! - [`ui`]: QR code rendering
//! - [`logging`]: Tracing subscriber setup

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod logging;
pub mod network;
pub mod share;
pub mod ui;

pub use protocol;

pub use config::{Config, ConfigError};

pub use files::{
    ArchiveManifest, ArchiveStreamer, ChunkedUploadCoordinator, CycleGuard, DirectoryWalker,
    FileOps, PathSandbox, TraversalResult, UploadOutcome,
};

pub use error::ApiError;
pub use http::{router, AppState};

pub use auth::AuthConfig;
pub use share::ShareRoot;
