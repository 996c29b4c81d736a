/// Server configuration read from the environment (after `.env` is loaded).
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tubedrop_downloader::YtDlpOptions;
use tubedrop_shared::janitor::JanitorConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub download_dir: PathBuf,
    pub static_dir: PathBuf,
    pub ytdlp_bin: String,
    pub max_concurrent: usize,
    pub cleanup_grace: Duration,
    pub job_retention: Duration,
    pub janitor_interval: Duration,
    pub socket_timeout_secs: u64,
    pub retries: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| Duration::from_secs(parsed(&lookup, key, default));

        Self {
            host: string("API_HOST", "0.0.0.0"),
            port: parsed(&lookup, "PORT", 5000),
            download_dir: PathBuf::from(string("DOWNLOAD_DIR", "./downloads")),
            static_dir: PathBuf::from(string("STATIC_DIR", "./static")),
            ytdlp_bin: string("YTDLP_BIN", "yt-dlp"),
            max_concurrent: parsed(&lookup, "MAX_CONCURRENT_DOWNLOADS", 4),
            cleanup_grace: secs("CLEANUP_GRACE_SECS", 10),
            job_retention: secs("JOB_RETENTION_SECS", 3600),
            janitor_interval: secs("JANITOR_INTERVAL_SECS", 300).max(Duration::from_secs(1)),
            socket_timeout_secs: parsed(&lookup, "YTDLP_SOCKET_TIMEOUT", 60),
            retries: parsed(&lookup, "YTDLP_RETRIES", 5),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn janitor(&self) -> JanitorConfig {
        JanitorConfig {
            grace: self.cleanup_grace,
            retention: self.job_retention,
            sweep_interval: self.janitor_interval,
        }
        .clamped()
    }

    pub fn ytdlp(&self) -> YtDlpOptions {
        YtDlpOptions {
            bin: self.ytdlp_bin.clone(),
            socket_timeout_secs: self.socket_timeout_secs,
            retries: self.retries,
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
