//! Streaming archive download with progress events

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::install::error::InstallError;
use crate::install::progress::{DownloadProgress, ProgressReporter};

const USER_AGENT: &str = concat!("modsync/", env!("CARGO_PKG_VERSION"));

/// Minimum spacing between intermediate progress events
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Identifies a download in progress events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub id: String,
    pub name: String,
}

pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(config.timeout())
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Download `url` into `<dest>.tmp`, then rename onto `dest`.
    ///
    /// The temporary file is removed when the transfer fails.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        task: &DownloadTask,
        reporter: &dyn ProgressReporter,
    ) -> Result<u64, InstallError> {
        let tmp = temp_path(dest);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallError::filesystem(parent, e))?;
        }

        let result = self.transfer(url, &tmp, task, reporter).await;
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&tmp).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to remove temporary file {:?}: {}", tmp, remove_err);
                }
                reporter.report(
                    DownloadProgress::started(&task.id, &task.name, None).fail(&e.to_string()),
                );
                return Err(e);
            }
        };

        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| InstallError::filesystem(dest, e))?;

        debug!("Downloaded {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }

    async fn transfer(
        &self,
        url: &str,
        tmp: &Path,
        task: &DownloadTask,
        reporter: &dyn ProgressReporter,
    ) -> Result<u64, InstallError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InstallError::download(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::download(url, format!("HTTP {}", status)));
        }

        let mut event = DownloadProgress::started(&task.id, &task.name, response.content_length());
        reporter.report(event.clone());

        let mut file = tokio::fs::File::create(tmp)
            .await
            .map_err(|e| InstallError::filesystem(tmp, e))?;

        let started = Instant::now();
        let mut last_report = started;
        let mut downloaded = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| InstallError::download(url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| InstallError::filesystem(tmp, e))?;
            downloaded += chunk.len() as u64;

            if last_report.elapsed() >= PROGRESS_INTERVAL {
                event.advance(downloaded, started.elapsed().as_secs_f64());
                reporter.report(event.clone());
                last_report = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| InstallError::filesystem(tmp, e))?;
        drop(file);

        event.advance(downloaded, started.elapsed().as_secs_f64());
        reporter.report(event.finish());
        Ok(downloaded)
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}

/// `<dest>.tmp` next to the final path
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::progress::MockProgressReporter;
    use mockito::Server;
    use tempfile::TempDir;

    fn task() -> DownloadTask {
        DownloadTask {
            id: "AABBCCDD".to_string(),
            name: "Example".to_string(),
        }
    }

    #[tokio::test]
    async fn download_writes_file_and_reports_completion() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files/example.jar")
            .with_status(200)
            .with_body("jar-bytes")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("mods/example.jar");
        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_report()
            .withf(|event| !event.completed && event.downloaded_bytes == 0)
            .times(1)
            .return_const(());
        reporter
            .expect_report()
            .withf(|event| event.completed && event.error.is_none() && event.downloaded_bytes == 9)
            .times(1)
            .return_const(());

        let url = format!("{}/files/example.jar", server.url());
        let written = Downloader::default()
            .download(&url, &dest, &task(), &reporter)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 9);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "jar-bytes");
        assert!(!temp_path(&dest).exists());
    }

    #[tokio::test]
    async fn failed_download_removes_temp_file_and_reports_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/missing.jar")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("mods/missing.jar");
        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_report()
            .withf(|event| event.error.is_some())
            .times(1)
            .return_const(());

        let url = format!("{}/files/missing.jar", server.url());
        let result = Downloader::default()
            .download(&url, &dest, &task(), &reporter)
            .await;

        assert!(matches!(result, Err(InstallError::Download { .. })));
        assert!(!dest.exists());
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/srv/mods/a.jar")),
            PathBuf::from("/srv/mods/a.jar.tmp")
        );
    }
}
