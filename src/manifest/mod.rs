//! Installed package records and their persisted sidecars

pub mod error;
pub mod record;
pub mod sidecar;
pub mod store;

pub use error::StoreError;
pub use record::{PackageRecord, is_registry_id, version_from_file_name};
pub use sidecar::{Sidecar, SidecarFields};
pub use store::{ManifestStore, validate_file_name};
