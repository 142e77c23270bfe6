//! Download strategies for acquiring source media.
//!
//! Each strategy is one concrete method of pulling bytes from the upstream
//! platform. The orchestrator in [`crate::acquire`] tries them strictly in
//! order; every per-revision "enhanced" download variant collapses into a
//! parameterized strategy here instead of a separate code path.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// An existing artifact smaller than this is treated as a stale remnant
/// and re-downloaded.
const MIN_REUSE_FILE_SIZE: u64 = 1024 * 1024;

/// Browser user agent presented by the yt-dlp strategies.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One concrete method of acquiring media bytes from the upstream platform.
#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    /// Stable name used in logs and attempt records.
    fn name(&self) -> &'static str;

    /// Fetch the media at `url` into `dest`. Failures surface the
    /// upstream error text so the classifier can categorize them.
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<()>;
}

/// yt-dlp backed strategy, parameterized by player client.
///
/// The web client is the primary path; the android client presents a
/// lighter fingerprint and frequently survives blocks that stop the web
/// client.
pub struct YtDlpStrategy {
    name: &'static str,
    player_client: &'static str,
    /// Sleep between metadata requests, seconds.
    sleep_requests: &'static str,
    /// Minimum sleep before the download itself, seconds.
    sleep_interval: &'static str,
}

impl YtDlpStrategy {
    /// Primary web-client strategy with full browser fingerprint.
    pub fn web() -> Self {
        Self {
            name: "yt-dlp-web",
            player_client: "web",
            sleep_requests: "0.75",
            sleep_interval: "5",
        }
    }

    /// Android-client fallback with a lighter request pattern.
    pub fn android() -> Self {
        Self {
            name: "yt-dlp-android",
            player_client: "android",
            sleep_requests: "1.5",
            sleep_interval: "8",
        }
    }

    fn build_args(&self, url: &str, dest: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--sleep-requests".into(),
            self.sleep_requests.into(),
            "--sleep-interval".into(),
            self.sleep_interval.into(),
            "--max-sleep-interval".into(),
            "20".into(),
            "--user-agent".into(),
            BROWSER_USER_AGENT.into(),
            "--add-header".into(),
            "Accept-Language:en-US,en;q=0.5".into(),
            "--add-header".into(),
            "DNT:1".into(),
            "--limit-rate".into(),
            "2M".into(),
            "--concurrent-fragments".into(),
            "1".into(),
            "--extractor-args".into(),
            format!("youtube:player_client={}", self.player_client),
            "-f".into(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".into(),
            "-o".into(),
            dest.to_string_lossy().to_string(),
        ];
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl DownloadStrategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<()> {
        if reuse_existing(dest).await? {
            return Ok(());
        }

        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        info!(
            strategy = self.name,
            url = url,
            output = %dest.display(),
            "Downloading video with yt-dlp"
        );

        let args = self.build_args(url, dest);
        let output = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(strategy = self.name, "yt-dlp stderr: {}", stderr);

            // Keep the trailing lines: that's where yt-dlp puts the reason
            let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
            let mut message: String = tail.into_iter().rev().collect::<Vec<_>>().join(" | ");
            if message.is_empty() {
                message = "unknown error".to_string();
            }
            return Err(MediaError::download_failed(format!(
                "yt-dlp failed: {}",
                message
            )));
        }

        if !dest.exists() {
            return Err(MediaError::download_failed("output file not created"));
        }

        let size = dest.metadata()?.len();
        info!(
            strategy = self.name,
            output = %dest.display(),
            size_mb = size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );
        Ok(())
    }
}

/// Direct HTTP download. Last-resort strategy for sources that expose a
/// plain media URL; streams the body to disk.
pub struct HttpStrategy {
    client: reqwest::Client,
}

impl HttpStrategy {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadStrategy for HttpStrategy {
    fn name(&self) -> &'static str {
        "http-direct"
    }

    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<()> {
        if reuse_existing(dest).await? {
            return Ok(());
        }

        info!(url = url, output = %dest.display(), "Downloading via direct HTTP");

        let response = self
            .client
            .get(url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("http request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!(
                "http {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.starts_with("text/html") {
            return Err(MediaError::download_failed(
                "response looks like an html page, not media",
            ));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| MediaError::download_failed(format!("http stream failed: {}", e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if dest.metadata()?.len() == 0 {
            warn!(url = url, "Direct HTTP download produced an empty file");
            return Err(MediaError::download_failed("empty response body"));
        }

        Ok(())
    }
}

/// Default production strategy chain, primary first.
pub fn default_strategies() -> Vec<std::sync::Arc<dyn DownloadStrategy>> {
    vec![
        std::sync::Arc::new(YtDlpStrategy::web()),
        std::sync::Arc::new(YtDlpStrategy::android()),
        std::sync::Arc::new(HttpStrategy::new()),
    ]
}

/// Reuse an already-downloaded artifact when it looks complete; delete
/// undersized remnants so the strategy starts clean.
async fn reuse_existing(dest: &Path) -> MediaResult<bool> {
    if dest.exists() {
        if let Ok(metadata) = dest.metadata() {
            if metadata.len() > MIN_REUSE_FILE_SIZE {
                info!("Using existing video file: {}", dest.display());
                return Ok(true);
            }
            warn!(
                "Existing file {} is too small ({} bytes), re-downloading",
                dest.display(),
                metadata.len()
            );
            tokio::fs::remove_file(dest).await?;
        }
    }
    Ok(false)
}
