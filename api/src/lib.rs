//! Tubedrop HTTP API.
//!
//! Thin axum layer over the job tracking core: handlers validate input,
//! hand work to the download pool and read job state back for pollers.

pub mod config;
pub mod error;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use tubedrop_shared::janitor::CleanupScheduler;
use tubedrop_shared::{DownloadPool, Downloader, Extractor, FileDelivery, JobStore};

/// Shared application state for all API handlers.
pub struct AppState {
    pub store: JobStore,
    pub pool: DownloadPool,
    pub extractor: Arc<dyn Extractor>,
    pub delivery: FileDelivery,
}

impl AppState {
    pub fn new(
        store: JobStore,
        extractor: Arc<dyn Extractor>,
        downloader: Arc<dyn Downloader>,
        download_dir: PathBuf,
        max_concurrent: usize,
        cleanup: CleanupScheduler,
    ) -> Self {
        Self {
            pool: DownloadPool::new(store.clone(), downloader, download_dir, max_concurrent),
            delivery: FileDelivery::new(store.clone(), cleanup),
            extractor,
            store,
        }
    }
}

/// Build the router. Static assets are served under `/static` when a directory is given.
pub fn router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/video-info", post(routes::video_info))
        .route("/api/download", post(routes::start_download))
        .route("/api/progress/:id", get(routes::progress))
        .route("/api/download-file/:id", get(routes::download_file))
        .route("/api/downloads", get(routes::list_downloads))
        .route("/health", get(routes::health))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}
