//! Package installation: download, placement and sidecar bookkeeping

pub mod batch;
pub mod download;
pub mod error;
pub mod filename;
pub mod pipeline;
pub mod progress;

pub use batch::{BatchItemError, BatchOutcome};
pub use download::{DownloadTask, Downloader};
pub use error::InstallError;
pub use pipeline::{InstallOutcome, InstallationPipeline, InstalledPackage, PackageDetails};
pub use progress::{DownloadProgress, NoopReporter, ProgressReporter, TracingReporter};
