/// Parsing of yt-dlp output lines.
///
/// Download runs use a custom progress template and a post-move print so
/// every interesting line starts with a fixed marker.
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use tubedrop_shared::ProgressEvent;

/// `--progress-template` value: downloaded bytes, total bytes, speed.
pub const PROGRESS_TEMPLATE: &str =
    "download:[progress] %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.speed)s";

/// `--print` value emitted once the final file is in place.
pub const DONE_TEMPLATE: &str = "after_move:[done] %(filepath)s";

/// Classified output line.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    Done(PathBuf),
    Error(String),
    Other,
}

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[progress\]\s+(\S+)\s+(\S+)\s+(\S+)\s*$").unwrap()
});

static DONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[done\]\s+(.+?)\s*$").unwrap()
});

static ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ERROR:\s*(.+?)\s*$").unwrap()
});

/// Fields yt-dlp could not fill are printed as `NA` (or `None`).
fn number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Classify one line of yt-dlp output.
pub fn parse_line(line: &str) -> OutputLine {
    let line = line.trim();

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let Some(downloaded) = number(&caps[1]) else {
            return OutputLine::Other;
        };
        return OutputLine::Progress(ProgressEvent::Downloading {
            downloaded_bytes: downloaded as u64,
            total_bytes: number(&caps[2]).map(|t| t as u64),
            speed: number(&caps[3]),
        });
    }

    if let Some(caps) = DONE_RE.captures(line) {
        return OutputLine::Done(PathBuf::from(&caps[1]));
    }

    if let Some(caps) = ERROR_RE.captures(line) {
        return OutputLine::Error(caps[1].to_string());
    }

    OutputLine::Other
}
