//! fabric.mod.json parser

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::archive::normalize_constraint;
use crate::archive::types::{ArchiveMetadata, LoaderKind};
use crate::compat::matcher::VersionConstraint;

pub const MANIFEST_NAME: &str = "fabric.mod.json";

#[derive(Debug, Deserialize)]
struct FabricModJson {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    #[serde(default)]
    depends: HashMap<String, VersionConstraint>,
}

/// Parse a fabric.mod.json document
pub fn parse(content: &str) -> Option<ArchiveMetadata> {
    let manifest: FabricModJson = parse_lenient_json(content)?;
    let mut depends = manifest.depends;

    Some(ArchiveMetadata {
        mod_id: manifest.id,
        name: manifest.name,
        version: manifest.version,
        description: manifest.description,
        minecraft_version: depends.remove("minecraft").and_then(normalize_constraint),
        loader_version: depends.remove("fabricloader").and_then(normalize_constraint),
        loader: LoaderKind::Fabric,
    })
}

/// Parse JSON, tolerating raw control characters inside strings.
///
/// Mod manifests in the wild often embed literal newlines in descriptions,
/// which strict JSON rejects.
pub(crate) fn parse_lenient_json<T: DeserializeOwned>(content: &str) -> Option<T> {
    let content = content.trim_start_matches('\u{feff}');
    serde_json::from_str(content)
        .or_else(|_| serde_json::from_str(&content.replace(['\n', '\r', '\t'], " ")))
        .inspect_err(|e| debug!("Failed to parse manifest JSON: {}", e))
        .ok()
}
