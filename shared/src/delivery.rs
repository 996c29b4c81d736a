/// Hands out finished downloads exactly as they sit on disk.
use std::path::Path;
use tokio::fs::File;
use tracing::{debug, info};

use crate::errors::DeliveryError;
use crate::janitor::{CleanupGuard, CleanupScheduler};
use crate::job_store::JobStore;
use crate::models::{JobId, JobStatus};

/// An opened artifact ready to stream. Dropping it schedules cleanup.
pub struct DeliveredFile {
    pub file: File,
    /// Name presented to the client, without the internal job id prefix.
    pub filename: String,
    pub len: u64,
    pub guard: CleanupGuard,
}

/// Resolves completed jobs to their files.
#[derive(Clone)]
pub struct FileDelivery {
    store: JobStore,
    cleanup: CleanupScheduler,
}

impl FileDelivery {
    pub fn new(store: JobStore, cleanup: CleanupScheduler) -> Self {
        Self { store, cleanup }
    }

    /// Open the artifact of a completed job. Any unmet precondition is `NotFound`.
    pub async fn open(&self, job_id: &JobId) -> Result<DeliveredFile, DeliveryError> {
        let job = self.store.get(job_id).await.ok_or(DeliveryError::NotFound)?;
        if job.status != JobStatus::Completed {
            debug!("Job {} not ready for delivery ({})", job_id, job.status);
            return Err(DeliveryError::NotFound);
        }
        let path = job.file_path.ok_or(DeliveryError::NotFound)?;

        let file = File::open(&path).await.map_err(|e| {
            debug!("Cannot open {} for job {}: {}", path.display(), job_id, e);
            DeliveryError::NotFound
        })?;
        let metadata = file.metadata().await.map_err(|_| DeliveryError::NotFound)?;
        if !metadata.is_file() {
            return Err(DeliveryError::NotFound);
        }

        let filename = delivered_name(job_id, &path);
        info!("Delivering job {} as {:?} ({} bytes)", job_id, filename, metadata.len());

        Ok(DeliveredFile {
            file,
            filename,
            len: metadata.len(),
            guard: self.cleanup.guard(*job_id),
        })
    }
}

/// File name shown to the client: the basename with the `<job id>_` prefix removed.
pub fn delivered_name(job_id: &JobId, path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{}_", job_id);
    let name = basename.strip_prefix(&prefix).unwrap_or(&basename);
    if name.is_empty() {
        "download".to_string()
    } else {
        name.to_string()
    }
}
