//! HTTP API.
//!
//! All endpoints share one [`AppState`]. Every request first passes the
//! read-only gate, then authentication, then reaches its handler.
//! Filesystem work runs on blocking threads.

pub mod guards;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::auth::AuthConfig;
use crate::config::Config;
use crate::files::{
    ArchiveStreamer, ChunkedUploadCoordinator, CycleGuard, DirectoryWalker, FileOps, PathSandbox,
};

/// Body limit for `/upload`; one chunk plus multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = 1024 * 1024;

/// Routes refused while the server is read-only.
pub const MUTATING_ROUTES: &[&str] = &["/upload", "/delete", "/move", "/newfile", "/newfolder"];

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub readonly: bool,
    pub auth: AuthConfig,
    pub sandbox: PathSandbox,
    pub walker: DirectoryWalker,
    pub archives: ArchiveStreamer,
    pub uploads: ChunkedUploadCoordinator,
    pub ops: FileOps,
}

impl AppState {
    /// State serving `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        readonly: bool,
        auth: AuthConfig,
        cycle_guard: CycleGuard,
    ) -> Self {
        let root = root.into();
        Self {
            readonly,
            auth,
            sandbox: PathSandbox::new(root.clone()),
            walker: DirectoryWalker::new(cycle_guard),
            archives: ArchiveStreamer::default(),
            uploads: ChunkedUploadCoordinator::new(root.clone()),
            ops: FileOps::new(root),
        }
    }

    /// State serving `root` with the settings from `config`.
    pub fn from_config(root: impl Into<PathBuf>, config: &Config, auth: AuthConfig) -> Self {
        Self::new(root, config.share.readonly, auth, config.listing.cycle_guard)
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/download/{*path}", get(handlers::download))
        .route("/zip/", get(handlers::zip_root))
        .route("/zip/{*path}", get(handlers::zip_path))
        .route("/files", get(handlers::list_files))
        .route("/delete", post(handlers::delete))
        .route("/move", post(handlers::move_item))
        .route("/newfile", post(handlers::new_file))
        .route("/newfolder", post(handlers::new_folder))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guards::require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guards::reject_when_readonly,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                // The query is left out; it may carry the access token.
                info_span!(
                    "http",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}
