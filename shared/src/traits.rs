/// Interfaces to the external media tool.
///
/// The core never talks to video sites itself; it goes through these traits so
/// the HTTP layer and workers can be tested against fakes.
use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::{DownloadError, ExtractionError};
use crate::models::VideoMetadata;
use crate::progress::ProgressSender;

/// Metadata lookup without side effects.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn probe(&self, url: &str) -> Result<VideoMetadata, ExtractionError>;
}

/// Everything a downloader needs for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    /// Resolved format selector.
    pub format: String,
    /// Output path template, e.g. `downloads/<job id>_%(title)s.%(ext)s`.
    pub output_template: String,
}

/// Media transfer that reports progress on the given channel.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Run the transfer to completion and return the path of the final file.
    ///
    /// Implementations emit `Downloading` events while bytes arrive and a
    /// `Finished` event once the artifact is in place, and must drop every
    /// clone of `events` before returning.
    async fn download(
        &self,
        request: &DownloadRequest,
        events: ProgressSender,
    ) -> Result<PathBuf, DownloadError>;
}
