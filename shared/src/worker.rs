/// Download workers and the bounded pool that launches them.
///
/// Each submitted job gets its own tokio task. A semaphore caps how many
/// transfers run at once; queued jobs stay `starting` until a slot frees up.
/// A supervising task records panics in the job store so a detached worker
/// can never fail silently.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::format::FormatSelection;
use crate::job_store::JobStore;
use crate::models::JobId;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::traits::{DownloadRequest, Downloader};

/// Launches one worker per job with concurrency control.
#[derive(Clone)]
pub struct DownloadPool {
    store: JobStore,
    reporter: ProgressReporter,
    downloader: Arc<dyn Downloader>,
    /// Semaphore to limit concurrent transfers.
    slots: Arc<Semaphore>,
    download_dir: PathBuf,
    max_concurrent: usize,
}

impl DownloadPool {
    pub fn new(
        store: JobStore,
        downloader: Arc<dyn Downloader>,
        download_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            reporter: ProgressReporter::new(store.clone()),
            store,
            downloader,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            download_dir: download_dir.into(),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of transfers currently holding a slot.
    pub fn running(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    /// Create a job and start its worker. Returns as soon as the worker is spawned.
    pub async fn submit(&self, url: String, selection: FormatSelection) -> JobId {
        let job_id = self.store.create().await;
        info!("Download queued: job={} format={} url={}", job_id, selection, url);

        let worker = DownloadWorker {
            job_id,
            url,
            selection,
            store: self.store.clone(),
            reporter: self.reporter.clone(),
            downloader: self.downloader.clone(),
            slots: self.slots.clone(),
            download_dir: self.download_dir.clone(),
        };

        let handle = tokio::spawn(worker.run());

        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("Worker for job {} aborted: {}", job_id, e);
                store
                    .update(&job_id, |job| job.fail(format!("Download worker aborted: {}", e)))
                    .await;
            }
        });

        job_id
    }
}

/// Output template for a job: the id prefix keeps names unique across
/// downloads of identically titled videos.
pub fn output_template(download_dir: &Path, job_id: &JobId) -> String {
    download_dir
        .join(format!("{}_%(title)s.%(ext)s", job_id))
        .to_string_lossy()
        .into_owned()
}

/// Runs exactly one job to completion or failure.
struct DownloadWorker {
    job_id: JobId,
    url: String,
    selection: FormatSelection,
    store: JobStore,
    reporter: ProgressReporter,
    downloader: Arc<dyn Downloader>,
    slots: Arc<Semaphore>,
    download_dir: PathBuf,
}

impl DownloadWorker {
    async fn run(self) {
        let job_id = self.job_id;

        let _permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Worker pool closed before job {} started", job_id);
                self.store
                    .update(&job_id, |job| job.fail("Download worker pool closed"))
                    .await;
                return;
            }
        };

        match self.store.update(&job_id, |job| job.mark_downloading()).await {
            Some(true) => {}
            Some(false) => {
                debug!("Job {} left the starting state before its worker ran", job_id);
                return;
            }
            None => {
                info!("Job {} removed before download started", job_id);
                return;
            }
        }

        let request = DownloadRequest {
            url: self.url.clone(),
            format: self.selection.selector(),
            output_template: output_template(&self.download_dir, &job_id),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let reporter = self.reporter.clone();
        let drain = async move {
            while let Some(event) = rx.recv().await {
                reporter.apply(&job_id, event).await;
            }
        };

        let (result, ()) = tokio::join!(self.downloader.download(&request, tx), drain);

        match result {
            Ok(path) => {
                // no-op when the Finished event already completed the job
                self.reporter.apply(&job_id, ProgressEvent::Finished { path }).await;
                info!("Download finished: job={}", job_id);
            }
            Err(e) => {
                warn!("Download failed: job={} error={}", job_id, e);
                let recorded = self.store.update(&job_id, |job| job.fail(e.to_string())).await;
                if recorded == Some(false) {
                    debug!("Job {} already terminal, failure not recorded", job_id);
                }
            }
        }
    }
}
