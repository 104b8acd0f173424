//! Installed package records

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::archive::{ArchiveMetadata, LoaderKind};
use crate::compat::matcher::VersionConstraint;
use crate::layout::{ARCHIVE_EXTENSION, Category, Location};
use crate::manifest::sidecar::Sidecar;

static REGISTRY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{8}$").unwrap());

/// A version-looking token following a separator, e.g. `-1.2.3` or `_v0.5.8+mc1.20.1`
static FILE_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[-_ ])[vV]?(\d+(?:\.\d+)+(?:[-+][0-9A-Za-z.+\-]*)?)").unwrap()
});

/// One installed archive, merged from its sidecar and the archive itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    /// Enabled file name, without the `.disabled` suffix
    pub file_name: String,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub version_number: Option<String>,
    pub version_id: Option<String>,
    pub minecraft_version: Option<VersionConstraint>,
    pub loader: Option<LoaderKind>,
    /// Mod id declared inside the archive
    pub mod_id: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub locations: BTreeSet<Location>,
}

impl PackageRecord {
    /// Merge sidecar data and freshly read archive metadata.
    ///
    /// Archive compatibility data supersedes the sidecar; sidecar display
    /// fields win when present; a registry-shaped sidecar project id is never
    /// replaced by an archive mod id.
    pub fn merge(
        file_name: &str,
        sidecar: Option<Sidecar>,
        metadata: Option<ArchiveMetadata>,
        locations: BTreeSet<Location>,
    ) -> Self {
        let sidecar = sidecar.unwrap_or_default();
        let metadata_loader = metadata.as_ref().map(|m| m.loader);
        let ArchiveMetadata {
            mod_id,
            name: archive_name,
            version: archive_version,
            description,
            minecraft_version: archive_minecraft,
            ..
        } = metadata.unwrap_or_else(|| ArchiveMetadata::new(LoaderKind::Fabric));

        let project_id = match sidecar.project_id {
            Some(id) if is_registry_id(&id) => Some(id),
            sidecar_id => mod_id.clone().or(sidecar_id),
        };

        let version_number = sidecar
            .version_number
            .or(archive_version)
            .or_else(|| version_from_file_name(file_name));

        Self {
            file_name: file_name.to_string(),
            project_id,
            name: sidecar.name.or(archive_name),
            version_number,
            version_id: sidecar.version_id,
            minecraft_version: archive_minecraft.or(sidecar.minecraft_version),
            loader: metadata_loader,
            mod_id,
            description,
            source: sidecar.source,
            updated_at: sidecar.updated_at,
            locations,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.locations.contains(&Location::Server) || self.locations.contains(&Location::Client)
    }

    pub fn is_disabled(&self) -> bool {
        !self.is_enabled() && self.locations.contains(&Location::Disabled)
    }

    /// Category implied by the current locations
    pub fn category(&self) -> Option<Category> {
        Category::from_enabled(
            self.locations.contains(&Location::Server),
            self.locations.contains(&Location::Client),
        )
        .or_else(|| self.is_disabled().then_some(Category::Disabled))
    }

    /// Name for display, falling back to the file name
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.file_name)
    }
}

/// Whether `id` has the shape of a registry project id (8 ASCII alphanumerics)
pub fn is_registry_id(id: &str) -> bool {
    REGISTRY_ID_RE.is_match(id)
}

/// Guess a version number from an archive file name
pub fn version_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_suffix(ARCHIVE_EXTENSION)
        .unwrap_or(file_name);
    FILE_VERSION_RE
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['-', '+', '.']).to_string())
}
