//! Download progress reporting

#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// One progress event for a download task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub id: String,
    pub name: String,
    /// Percentage in `0.0..=100.0`; stays at 0 while the total size is unknown
    pub progress: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Bytes per second since the transfer started
    pub speed: f64,
    pub completed: bool,
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn started(id: &str, name: &str, total_bytes: Option<u64>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes,
            speed: 0.0,
            completed: false,
            error: None,
        }
    }

    /// Update the byte counters and derived percentage
    pub fn advance(&mut self, downloaded_bytes: u64, elapsed_secs: f64) {
        self.downloaded_bytes = downloaded_bytes;
        if let Some(total) = self.total_bytes.filter(|t| *t > 0) {
            self.progress = (downloaded_bytes as f64 / total as f64 * 100.0).min(100.0);
        }
        if elapsed_secs > 0.0 {
            self.speed = downloaded_bytes as f64 / elapsed_secs;
        }
    }

    pub fn finish(mut self) -> Self {
        self.completed = true;
        self.progress = 100.0;
        self
    }

    pub fn fail(mut self, error: &str) -> Self {
        self.completed = true;
        self.error = Some(error.to_string());
        self
    }
}

/// Receives progress events from the installation pipeline
#[cfg_attr(test, automock)]
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: DownloadProgress);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: DownloadProgress) {}
}

/// Logs events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: DownloadProgress) {
        if let Some(error) = &event.error {
            warn!("Download of {} failed: {}", event.name, error);
        } else if event.completed {
            info!(
                "Downloaded {} ({} bytes)",
                event.name, event.downloaded_bytes
            );
        } else {
            debug!(
                "Downloading {}: {:.1}% ({} bytes, {:.0} B/s)",
                event.name, event.progress, event.downloaded_bytes, event.speed
            );
        }
    }
}

/// Forwards events to a channel; a closed receiver is ignored
impl ProgressReporter for UnboundedSender<DownloadProgress> {
    fn report(&self, event: DownloadProgress) {
        let _ = self.send(event);
    }
}
