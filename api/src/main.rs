/// Tubedrop API Server
///
/// Web front-end for yt-dlp: clients request video info, start background
/// downloads, poll their progress and fetch the finished file once.
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tubedrop_api::config::Config;
use tubedrop_api::AppState;
use tubedrop_downloader::YtDlp;
use tubedrop_shared::janitor::{janitor, purge_orphans};
use tubedrop_shared::JobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tubedrop_api=info,tubedrop_shared=info,tubedrop_downloader=info,tower_http=info".into()
            }),
        )
        .init();

    let config = Config::from_env();
    info!("Download directory: {}", config.download_dir.display());

    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("creating download directory {}", config.download_dir.display()))?;

    // Nothing from a previous run can still be fetched
    match purge_orphans(&config.download_dir).await {
        Ok(n) if n > 0 => info!("Removed {} leftover files from a previous run", n),
        Err(e) => warn!("Could not scan download directory: {}", e),
        _ => {}
    }

    let store = JobStore::new();
    let ytdlp = Arc::new(YtDlp::new(config.ytdlp()));
    let shutdown = CancellationToken::new();

    // Background cleanup of delivered and stale downloads
    let (cleanup, janitor) = janitor(store.clone(), config.janitor(), shutdown.clone());
    let janitor_handle = tokio::spawn(janitor.with_download_dir(&config.download_dir).run());

    let state = Arc::new(AppState::new(
        store,
        ytdlp.clone(),
        ytdlp,
        config.download_dir.clone(),
        config.max_concurrent,
        cleanup,
    ));

    let static_dir = config.static_dir.is_dir().then_some(config.static_dir.as_path());
    let app = tubedrop_api::router(state, static_dir);

    let addr = config.bind_addr();
    info!(
        "Tubedrop API listening on {} (yt-dlp: {}, max concurrent downloads: {})",
        addr, config.ytdlp_bin, config.max_concurrent
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = janitor_handle.await {
        warn!("Janitor task failed: {}", e);
    }
    info!("Tubedrop API stopped.");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        // keep serving; the janitor still stops when the server exits
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    token.cancel();
}
