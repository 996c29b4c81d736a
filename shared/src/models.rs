/// Data models shared across all Tubedrop crates.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of formats returned by the video info endpoint.
pub const MAX_LISTED_FORMATS: usize = 10;

// ====== JOBS ======

/// Identifier of a download job. Rendered as a hyphenated UUID on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Download job status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Downloading,
    Completed,
    Error,
}

impl JobStatus {
    /// Whether no further progress is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Downloading => write!(f, "downloading"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Tracked state of one download job, as returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub status: JobStatus,
    /// Percentage, 0-100, rounded to two decimals.
    pub progress: f64,
    #[serde(rename = "downloaded")]
    pub downloaded_bytes: u64,
    /// Zero until the transfer reports a content length.
    #[serde(rename = "total")]
    pub total_bytes: u64,
    /// Bytes per second.
    pub speed: Option<f64>,
    pub file_path: Option<PathBuf>,
    #[serde(rename = "error")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new() -> Self {
        Self {
            status: JobStatus::Starting,
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed: None,
            file_path: None,
            error_message: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move a starting job to `downloading`. Returns false if the job already moved on.
    pub fn mark_downloading(&mut self) -> bool {
        if self.status != JobStatus::Starting {
            return false;
        }
        self.status = JobStatus::Downloading;
        true
    }

    /// Record the final artifact. Terminal states are sticky.
    pub fn complete(&mut self, path: PathBuf) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.file_path = Some(path);
        self.error_message = None;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Record a failure. Terminal states are sticky.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Error;
        self.error_message = Some(message.into());
        self.file_path = None;
        self.finished_at = Some(Utc::now());
        true
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

// ====== VIDEO METADATA ======

/// One stream variant as described by the extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormatDescriptor {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    /// Human quality label ("720p", "medium", ...).
    pub format_note: Option<String>,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

impl FormatDescriptor {
    /// False only when both codecs are explicitly "none".
    pub fn has_stream(&self) -> bool {
        self.vcodec.as_deref() != Some("none") || self.acodec.as_deref() != Some("none")
    }
}

/// Raw metadata returned by the extractor. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub upload_date: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

/// Format entry in the video info response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatInfo {
    pub format_id: Option<String>,
    pub ext: Option<String>,
    pub quality: String,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

impl From<FormatDescriptor> for FormatInfo {
    fn from(f: FormatDescriptor) -> Self {
        Self {
            format_id: f.format_id,
            ext: f.ext,
            quality: f.format_note.unwrap_or_else(|| "Unknown".to_string()),
            filesize: f.filesize,
            vcodec: f.vcodec,
            acodec: f.acodec,
        }
    }
}

/// Video info response: extractor metadata with defaults filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub duration: f64,
    pub uploader: String,
    pub view_count: u64,
    pub thumbnail: Option<String>,
    pub description: String,
    pub upload_date: Option<String>,
    pub formats: Vec<FormatInfo>,
}

impl From<VideoMetadata> for VideoInfo {
    fn from(meta: VideoMetadata) -> Self {
        let formats = meta
            .formats
            .into_iter()
            .filter(FormatDescriptor::has_stream)
            .take(MAX_LISTED_FORMATS)
            .map(FormatInfo::from)
            .collect();

        Self {
            title: meta.title.unwrap_or_else(|| "Sin título".to_string()),
            duration: meta.duration.unwrap_or(0.0),
            uploader: meta.uploader.unwrap_or_else(|| "Desconocido".to_string()),
            view_count: meta.view_count.unwrap_or(0),
            thumbnail: meta.thumbnail,
            description: meta.description.unwrap_or_default(),
            upload_date: meta.upload_date,
            formats,
        }
    }
}
