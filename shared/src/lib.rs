//! Tubedrop core: job tracking for asynchronous media downloads.
//!
//! The HTTP layer creates jobs through [`worker::DownloadPool`], pollers read
//! them from [`job_store::JobStore`], and [`delivery::FileDelivery`] hands out
//! the finished file before the [`janitor`] removes it.

pub mod delivery;
pub mod errors;
pub mod format;
pub mod janitor;
pub mod job_store;
pub mod link;
pub mod models;
pub mod progress;
pub mod traits;
pub mod worker;

pub use delivery::{DeliveredFile, FileDelivery};
pub use errors::{DeliveryError, DownloadError, ExtractionError};
pub use format::FormatSelection;
pub use job_store::JobStore;
pub use models::{Job, JobId, JobStatus, VideoInfo, VideoMetadata};
pub use progress::{ProgressEvent, ProgressReporter, ProgressSender};
pub use traits::{DownloadRequest, Downloader, Extractor};
pub use worker::DownloadPool;
