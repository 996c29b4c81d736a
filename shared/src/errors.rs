/// Error types for the Tubedrop core and its media collaborators.
use thiserror::Error;

/// Errors raised while probing a URL for metadata.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to launch extractor: {0}")]
    Spawn(String),

    #[error("{0}")]
    Failed(String),

    #[error("No se pudo extraer información del video")]
    NoResult,

    #[error("extractor returned invalid JSON: {0}")]
    InvalidOutput(String),
}

/// Errors raised by a download in flight. Only ever surfaced through the job record.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to launch downloader: {0}")]
    Spawn(String),

    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("downloader finished without reporting an output file")]
    MissingOutput,
}

/// Errors returned when a finished file cannot be handed out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("download not found or not ready")]
    NotFound,
}
