/// Deferred cleanup of delivered downloads.
///
/// The janitor is a single long-lived task. Cleanup requests arrive on a
/// channel and wait out a grace delay in a `DelayQueue` so the client can
/// finish reading the response. A periodic sweep evicts finished jobs that
/// were never fetched. On shutdown every pending cleanup runs immediately.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info, warn};

use crate::job_store::JobStore;
use crate::models::{Job, JobId};

/// Timing knobs for the janitor loop.
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Delay between delivery and deletion.
    pub grace: Duration,
    /// How long finished jobs are kept when nobody fetches them.
    pub retention: Duration,
    /// Interval between stale-job sweeps.
    pub sweep_interval: Duration,
}

/// Longest grace delay or retention honoured; the timer wheel has a finite horizon.
pub const MAX_JANITOR_DELAY: Duration = Duration::from_secs(365 * 24 * 3600);

impl JanitorConfig {
    /// Bring every knob into the range the timers accept.
    pub fn clamped(self) -> Self {
        Self {
            grace: self.grace.min(MAX_JANITOR_DELAY),
            retention: self.retention.min(MAX_JANITOR_DELAY),
            sweep_interval: self.sweep_interval.clamp(Duration::from_millis(1), MAX_JANITOR_DELAY),
        }
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Handle used to request cleanup of a job.
#[derive(Clone)]
pub struct CleanupScheduler {
    tx: mpsc::UnboundedSender<JobId>,
}

impl CleanupScheduler {
    /// Queue cleanup of a job after the grace delay.
    pub fn schedule(&self, job_id: JobId) {
        if self.tx.send(job_id).is_err() {
            debug!("Janitor stopped, cleanup of job {} not scheduled", job_id);
        }
    }

    /// Guard that schedules cleanup when dropped.
    pub fn guard(&self, job_id: JobId) -> CleanupGuard {
        CleanupGuard {
            job_id,
            scheduler: self.clone(),
        }
    }
}

/// Schedules cleanup of its job when dropped, i.e. once the response body
/// holding it has been fully sent or abandoned.
pub struct CleanupGuard {
    job_id: JobId,
    scheduler: CleanupScheduler,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.scheduler.schedule(self.job_id);
    }
}

/// Background task that owns all pending cleanups.
pub struct Janitor {
    store: JobStore,
    rx: mpsc::UnboundedReceiver<JobId>,
    config: JanitorConfig,
    shutdown: CancellationToken,
    /// Where failed jobs may have left partial files.
    download_dir: Option<PathBuf>,
}

/// Create a janitor and the scheduler that feeds it.
pub fn janitor(
    store: JobStore,
    config: JanitorConfig,
    shutdown: CancellationToken,
) -> (CleanupScheduler, Janitor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CleanupScheduler { tx },
        Janitor {
            store,
            rx,
            config: config.clamped(),
            shutdown,
            download_dir: None,
        },
    )
}

impl Janitor {
    /// Also delete `<job id>_*` leftovers of evicted jobs that never produced a file.
    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(download_dir.into());
        self
    }

    /// Run until the shutdown token fires, then flush pending cleanups.
    pub async fn run(mut self) {
        let mut pending: DelayQueue<JobId> = DelayQueue::new();
        let mut keys: HashMap<JobId, delay_queue::Key> = HashMap::new();
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "Janitor started (grace={}s, retention={}s)",
            self.config.grace.as_secs(),
            self.config.retention.as_secs()
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(job_id) = self.rx.recv() => {
                    // a second delivery of the same job restarts its grace delay
                    match keys.get(&job_id) {
                        Some(key) => pending.reset(key, self.config.grace),
                        None => {
                            let key = pending.insert(job_id, self.config.grace);
                            keys.insert(job_id, key);
                        }
                    }
                    debug!("Cleanup of job {} scheduled", job_id);
                }
                Some(expired) = pending.next() => {
                    let job_id = expired.into_inner();
                    keys.remove(&job_id);
                    cleanup_job(&self.store, &job_id).await;
                }
                _ = sweep.tick() => {
                    self.sweep_stale().await;
                }
            }
        }

        // requests still in the channel count as pending too
        let mut remaining: Vec<JobId> = keys.into_keys().collect();
        while let Ok(job_id) = self.rx.try_recv() {
            if !remaining.contains(&job_id) {
                remaining.push(job_id);
            }
        }
        if !remaining.is_empty() {
            info!("Janitor stopping, running {} pending cleanups", remaining.len());
        }
        for job_id in &remaining {
            cleanup_job(&self.store, job_id).await;
        }
        info!("Janitor stopped");
    }

    async fn sweep_stale(&self) {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return;
        };
        let evicted = self.store.evict_finished_before(cutoff).await;
        if evicted.is_empty() {
            return;
        }
        for (job_id, job) in &evicted {
            remove_artifact(job).await;
            if let (None, Some(dir)) = (&job.file_path, &self.download_dir) {
                match remove_job_files(dir, job_id).await {
                    Ok(0) => {}
                    Ok(n) => debug!("Removed {} leftover files of job {}", n, job_id),
                    Err(e) => debug!("Could not scan {} for job {}: {}", dir.display(), job_id, e),
                }
            }
        }
        info!("Evicted {} stale jobs", evicted.len());
    }
}

/// Remove a job record and its backing file. Failures are ignored.
pub async fn cleanup_job(store: &JobStore, job_id: &JobId) {
    match store.remove(job_id).await {
        Some(job) => {
            remove_artifact(&job).await;
            info!("Job {} cleaned up", job_id);
        }
        None => debug!("Job {} already cleaned up", job_id),
    }
}

async fn remove_artifact(job: &Job) {
    if let Some(path) = &job.file_path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!("Could not delete {}: {}", path.display(), e);
        }
    }
}

/// Delete every `<job id>_...` file of one job, e.g. `.part` files of a failed transfer.
async fn remove_job_files(download_dir: &Path, job_id: &JobId) -> std::io::Result<usize> {
    let prefix = format!("{}_", job_id);
    let mut entries = tokio::fs::read_dir(download_dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        if tokio::fs::remove_file(entry.path()).await.is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Delete leftover artifacts from a previous run. Only files named
/// `<job id>_...` are touched; returns how many were removed.
pub async fn purge_orphans(download_dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(download_dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_artifact = name
            .split_once('_')
            .is_some_and(|(prefix, _)| prefix.parse::<JobId>().is_ok());
        if !is_artifact || !entry.file_type().await?.is_file() {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not delete orphaned file {}: {}", name, e),
        }
    }
    Ok(removed)
}
