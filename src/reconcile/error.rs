use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Not installed: {0}")]
    NotInstalled(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reconciliation of {file_name} incomplete: {failures}")]
    Incomplete { file_name: String, failures: String },
}

impl ReconcileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconcileError::Io {
            path: path.into(),
            source,
        }
    }
}
