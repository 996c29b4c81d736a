//! Tubedrop media collaborator: drives the yt-dlp command line tool.
//!
//! Implements the core's `Extractor` and `Downloader` traits.

pub mod output;
pub mod ytdlp;

pub use ytdlp::{YtDlp, YtDlpOptions};
