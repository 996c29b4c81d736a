/// Progress events emitted by a downloader and their translation into job updates.
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;

use crate::job_store::JobStore;
use crate::models::{JobId, JobStatus};

/// Raw event reported by the downloader while a transfer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        /// Bytes per second.
        speed: Option<f64>,
    },
    /// Final artifact written to disk.
    Finished { path: PathBuf },
}

/// Sending half handed to a downloader for one job.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Percentage of `downloaded` over `total`, rounded to two decimals.
/// `None` while the total is unknown.
pub fn percentage(downloaded: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let pct = (downloaded as f64 / total as f64 * 100.0).min(100.0);
    Some((pct * 100.0).round() / 100.0)
}

/// Applies progress events to the job store.
#[derive(Clone)]
pub struct ProgressReporter {
    store: JobStore,
}

impl ProgressReporter {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    /// Apply one event. Returns false when the event was dropped, either
    /// because the job is gone or because it already reached a terminal state.
    pub async fn apply(&self, job_id: &JobId, event: ProgressEvent) -> bool {
        let applied = self
            .store
            .update(job_id, |job| {
                if job.is_terminal() {
                    return false;
                }
                match event {
                    ProgressEvent::Downloading {
                        downloaded_bytes,
                        total_bytes,
                        speed,
                    } => {
                        job.status = JobStatus::Downloading;
                        job.downloaded_bytes = downloaded_bytes;
                        job.speed = speed;
                        if let Some(total) = total_bytes.filter(|t| *t > 0) {
                            job.total_bytes = total;
                            if let Some(pct) = percentage(downloaded_bytes, total) {
                                job.progress = job.progress.max(pct);
                            }
                        }
                        true
                    }
                    ProgressEvent::Finished { path } => job.complete(path),
                }
            })
            .await;

        match applied {
            Some(applied) => applied,
            None => {
                debug!("Progress for removed job {} dropped", job_id);
                false
            }
        }
    }
}
