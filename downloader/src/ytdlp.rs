/// yt-dlp subprocess driver.
///
/// Metadata lookups run `yt-dlp --dump-single-json`; downloads run yt-dlp with
/// a machine-readable progress template and read stdout/stderr line by line.
/// Tool diagnostics are forwarded to tracing under the `yt_dlp` target.
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use tubedrop_shared::errors::{DownloadError, ExtractionError};
use tubedrop_shared::models::{FormatDescriptor, VideoMetadata};
use tubedrop_shared::progress::{ProgressEvent, ProgressSender};
use tubedrop_shared::traits::{DownloadRequest, Downloader, Extractor};

use crate::output::{parse_line, OutputLine, DONE_TEMPLATE, PROGRESS_TEMPLATE};

/// Android client identity sent to YouTube.
const ANDROID_USER_AGENT: &str = "com.google.android.youtube/17.31.35 (Linux; U; Android 11) gzip";
const ANDROID_CLIENT_VERSION: &str = "17.31.35";

/// Settings for invoking yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    /// yt-dlp executable (name on PATH or full path).
    pub bin: String,
    pub socket_timeout_secs: u64,
    pub retries: u32,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            bin: "yt-dlp".to_string(),
            socket_timeout_secs: 60,
            retries: 5,
        }
    }
}

/// Media collaborator backed by the yt-dlp command line tool.
#[derive(Debug, Clone, Default)]
pub struct YtDlp {
    options: YtDlpOptions,
}

impl YtDlp {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &YtDlpOptions {
        &self.options
    }

    /// Client spoofing and retry options shared by every invocation.
    fn common_args(&self) -> Vec<String> {
        vec![
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--extractor-args".to_string(),
            "youtube:player_client=android,mweb,web;player_skip=webpage,configs".to_string(),
            "--extractor-args".to_string(),
            "youtubetab:skip=webpage".to_string(),
            "--user-agent".to_string(),
            ANDROID_USER_AGENT.to_string(),
            "--add-header".to_string(),
            "X-YouTube-Client-Name:3".to_string(),
            "--add-header".to_string(),
            format!("X-YouTube-Client-Version:{}", ANDROID_CLIENT_VERSION),
            "--socket-timeout".to_string(),
            self.options.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            self.options.retries.to_string(),
            "--fragment-retries".to_string(),
            self.options.retries.to_string(),
        ]
    }

    /// Arguments for a metadata lookup.
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-single-json".to_string()];
        args.extend(self.common_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Arguments for a download run.
    pub fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            request.output_template.clone(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            DONE_TEMPLATE.to_string(),
            "--no-simulate".to_string(),
        ];
        args.extend(self.common_args());
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

// ====== METADATA ======

/// Subset of the yt-dlp info dict that the API exposes.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    description: Option<String>,
    upload_date: Option<String>,
    #[serde(default)]
    formats: Option<Vec<Option<RawFormat>>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    format_note: Option<String>,
    filesize: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

impl From<RawInfo> for VideoMetadata {
    fn from(raw: RawInfo) -> Self {
        let formats = raw
            .formats
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|f| FormatDescriptor {
                format_id: f.format_id,
                ext: f.ext,
                format_note: f.format_note,
                filesize: f.filesize.filter(|s| *s >= 0.0).map(|s| s as u64),
                vcodec: f.vcodec,
                acodec: f.acodec,
            })
            .collect();

        VideoMetadata {
            title: raw.title,
            duration: raw.duration,
            uploader: raw.uploader,
            view_count: raw.view_count,
            thumbnail: raw.thumbnail,
            description: raw.description,
            upload_date: raw.upload_date,
            formats,
        }
    }
}

/// Parse `--dump-single-json` output. Empty output or `null` means no result.
pub fn parse_info_json(stdout: &str) -> Result<VideoMetadata, ExtractionError> {
    let stdout = stdout.trim();
    if stdout.is_empty() || stdout == "null" {
        return Err(ExtractionError::NoResult);
    }
    let raw: RawInfo =
        serde_json::from_str(stdout).map_err(|e| ExtractionError::InvalidOutput(e.to_string()))?;
    Ok(raw.into())
}

/// Last `ERROR:` line of a stderr dump, or the last non-empty line.
fn failure_message(stderr: &str) -> Option<String> {
    let mut last_line = None;
    let mut last_error = None;
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        if let OutputLine::Error(message) = parse_line(line) {
            last_error = Some(message);
        }
        last_line = Some(line.trim().to_string());
    }
    last_error.or(last_line)
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<VideoMetadata, ExtractionError> {
        debug!("Probing {}", url);
        let output = Command::new(&self.options.bin)
            .args(self.probe_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Spawn(format!("{} ({})", e, self.options.bin)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "yt_dlp", "{}", line);
        }

        if !output.status.success() {
            let message = failure_message(&stderr)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            warn!("Metadata lookup failed for {}: {}", url, message);
            return Err(ExtractionError::Failed(message));
        }

        parse_info_json(&String::from_utf8_lossy(&output.stdout))
    }
}

// ====== DOWNLOAD ======

/// What one output stream contributed.
#[derive(Debug, Default)]
struct StreamSummary {
    final_path: Option<PathBuf>,
    last_error: Option<String>,
}

/// Read one output stream to EOF, forwarding progress as it arrives.
async fn pump<R>(reader: R, events: ProgressSender) -> std::io::Result<StreamSummary>
where
    R: AsyncRead + Unpin,
{
    let mut summary = StreamSummary::default();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // yt-dlp echoes titles in the locale encoding
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        match parse_line(line) {
            OutputLine::Progress(event) => {
                let _ = events.send(event);
            }
            OutputLine::Done(path) => {
                let _ = events.send(ProgressEvent::Finished { path: path.clone() });
                summary.final_path = Some(path);
            }
            OutputLine::Error(message) => {
                debug!(target: "yt_dlp", "ERROR: {}", message);
                summary.last_error = Some(message);
            }
            OutputLine::Other => {
                if !line.trim().is_empty() {
                    debug!(target: "yt_dlp", "{}", line);
                }
            }
        }
    }
    Ok(summary)
}

#[async_trait]
impl Downloader for YtDlp {
    async fn download(
        &self,
        request: &DownloadRequest,
        events: ProgressSender,
    ) -> Result<PathBuf, DownloadError> {
        let mut child = Command::new(&self.options.bin)
            .args(self.download_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Spawn(format!("{} ({})", e, self.options.bin)))?;

        info!("yt-dlp spawned (pid: {:?}) format={}", child.id(), request.format);

        let stdout = child.stdout.take()
            .ok_or_else(|| DownloadError::Spawn("no stdout handle".into()))?;
        let stderr = child.stderr.take()
            .ok_or_else(|| DownloadError::Spawn("no stderr handle".into()))?;

        let (out, err) = tokio::join!(pump(stdout, events.clone()), pump(stderr, events));
        let status = child.wait().await?;
        let out = out?;
        let err = err?;

        if !status.success() {
            let message = err
                .last_error
                .or(out.last_error)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            return Err(DownloadError::Failed(message));
        }

        out.final_path
            .or(err.final_path)
            .ok_or(DownloadError::MissingOutput)
    }
}
