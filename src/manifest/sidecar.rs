//! Sidecar metadata files stored next to installed archives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compat::matcher::VersionConstraint;

/// Persisted bookkeeping for one archive, `<manifest dir>/<fileName>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Sidecar {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub file_name: String,
    pub version_id: Option<String>,
    pub version_number: Option<String>,
    pub source: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_version: Option<VersionConstraint>,
}

/// Fields supplied by a caller when writing a sidecar.
///
/// `None` means "keep whatever the existing sidecar holds".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidecarFields {
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub version_id: Option<String>,
    pub version_number: Option<String>,
    pub source: Option<String>,
    pub minecraft_version: Option<VersionConstraint>,
}

impl Sidecar {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            ..Self::default()
        }
    }

    /// Overwrite with every provided field and refresh `updated_at`
    pub fn merge(&mut self, fields: SidecarFields) {
        let SidecarFields {
            project_id,
            name,
            version_id,
            version_number,
            source,
            minecraft_version,
        } = fields;

        if project_id.is_some() {
            self.project_id = project_id;
        }
        if name.is_some() {
            self.name = name;
        }
        if version_id.is_some() {
            self.version_id = version_id;
        }
        if version_number.is_some() {
            self.version_number = version_number;
        }
        if source.is_some() {
            self.source = source;
        }
        if minecraft_version.is_some() {
            self.minecraft_version = minecraft_version;
        }
        self.updated_at = Some(Utc::now());
    }
}
