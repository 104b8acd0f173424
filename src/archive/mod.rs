//! Archive metadata extraction
//!
//! Reads identity, version and compatibility metadata embedded in a mod
//! archive. Three manifest dialects are understood, tried in a fixed order:
//!
//! - [`fabric`]: `fabric.mod.json`
//! - [`quilt`]: `quilt.mod.json` with a nested `quilt_loader` object
//! - [`mods_toml`]: `META-INF/neoforge.mods.toml` / `META-INF/mods.toml`
//!
//! Read and parse failures never reach the caller; they surface as `None`.

pub mod cache;
pub mod entries;
pub mod fabric;
pub mod mods_toml;
pub mod quilt;
pub mod types;

use std::path::Path;

use tracing::debug;

pub use cache::ArchiveMetadataCache;
pub use entries::{ArchiveEntries, JarArchive};
pub use types::{ArchiveMetadata, LoaderKind, ManifestDialect};

use crate::compat::matcher::{VersionConstraint, collapse_versions};

/// Read metadata from the archive at `path`.
///
/// Returns `None` when the file cannot be opened, is not a zip archive,
/// or carries none of the known manifests.
pub fn read_metadata(path: &Path) -> Option<ArchiveMetadata> {
    let mut archive = JarArchive::open(path)
        .inspect_err(|e| debug!("Cannot open archive {:?}: {}", path, e))
        .ok()?;

    let metadata = read_metadata_from(&mut archive);
    if metadata.is_none() {
        debug!("No known manifest found in {:?}", path);
    }
    metadata
}

/// Try every dialect in priority order against an open archive
pub fn read_metadata_from(archive: &mut dyn ArchiveEntries) -> Option<ArchiveMetadata> {
    ManifestDialect::PRIORITY
        .iter()
        .find_map(|dialect| dialect.read(archive))
}

/// Normalize a declared dependency constraint.
///
/// A single-element array becomes that element, a multi-element array of
/// plain versions collapses into a `>=min <=max` range.
pub(crate) fn normalize_constraint(constraint: VersionConstraint) -> Option<VersionConstraint> {
    match constraint {
        VersionConstraint::One(expr) => {
            let expr = expr.trim();
            (!expr.is_empty()).then(|| VersionConstraint::One(expr.to_string()))
        }
        VersionConstraint::AnyOf(items) => {
            let plain: Option<Vec<String>> = items
                .iter()
                .map(|item| match item {
                    VersionConstraint::One(expr) => Some(expr.clone()),
                    VersionConstraint::AnyOf(_) => None,
                })
                .collect();

            match plain {
                Some(versions) if versions.iter().all(|v| is_plain_version(v)) => {
                    collapse_versions(&versions)
                }
                Some(versions) if versions.len() == 1 => {
                    collapse_versions(&versions)
                }
                _ if items.is_empty() => None,
                _ => Some(VersionConstraint::AnyOf(items)),
            }
        }
    }
}

/// True for versions like `1.20.1` that carry no operator or wildcard
fn is_plain_version(version: &str) -> bool {
    let version = version.trim();
    !version.is_empty()
        && version
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
        && crate::compat::matcher::parse_numeric(version).is_some()
}
