/// URL acceptance rules for incoming download requests.
///
/// Only YouTube watch pages, youtu.be short links and Shorts are accepted.

/// Substrings that mark a URL as a YouTube video link.
const YOUTUBE_PATTERNS: &[&str] = &["youtube.com/watch", "youtu.be/", "youtube.com/shorts"];

/// Whether the URL points at a single YouTube video.
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_PATTERNS.iter().any(|pattern| url.contains(pattern))
}
