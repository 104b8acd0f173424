use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::StoreError;
use crate::reconcile::ReconcileError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No download URL for {0}")]
    NoDownloadUrl(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl InstallError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn download(url: &str, reason: impl ToString) -> Self {
        InstallError::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
