/// Format selection for download requests.
///
/// A request names either audio-only, a quality tier, or a literal format id.
/// Each resolves to a yt-dlp format selector string.
use std::fmt;

/// What the client asked to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSelection {
    /// Best audio stream, falling back to the best combined stream.
    AudioOnly,
    Best,
    /// Best stream not exceeding the given height.
    AtMostHeight(u32),
    /// Literal format id, passed through unresolved.
    FormatId(String),
}

impl FormatSelection {
    /// Build from the request fields. `audio_only` wins over any quality.
    pub fn from_request(quality: Option<&str>, audio_only: bool) -> Self {
        if audio_only {
            return FormatSelection::AudioOnly;
        }
        match quality.map(str::trim) {
            None | Some("") | Some("best") => FormatSelection::Best,
            Some("1080") => FormatSelection::AtMostHeight(1080),
            Some("720") => FormatSelection::AtMostHeight(720),
            Some("480") => FormatSelection::AtMostHeight(480),
            Some(other) => FormatSelection::FormatId(other.to_string()),
        }
    }

    /// Selector string understood by the downloader.
    pub fn selector(&self) -> String {
        match self {
            FormatSelection::AudioOnly => "bestaudio/best".to_string(),
            FormatSelection::Best => "best".to_string(),
            FormatSelection::AtMostHeight(h) => format!("best[height<={}]", h),
            FormatSelection::FormatId(id) => id.clone(),
        }
    }
}

impl fmt::Display for FormatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector())
    }
}
