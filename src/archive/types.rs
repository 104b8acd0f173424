//! Common types for archive metadata

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archive::entries::ArchiveEntries;
use crate::archive::{fabric, mods_toml, quilt};
use crate::compat::matcher::VersionConstraint;

/// Mod-loading ecosystem an archive targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Fabric,
    Quilt,
    Forge,
    #[serde(rename = "neoforge")]
    NeoForge,
}

impl LoaderKind {
    /// Returns the registry identifier of the loader
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Fabric => "fabric",
            LoaderKind::Quilt => "quilt",
            LoaderKind::Forge => "forge",
            LoaderKind::NeoForge => "neoforge",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fabric" => Ok(LoaderKind::Fabric),
            "quilt" => Ok(LoaderKind::Quilt),
            "forge" => Ok(LoaderKind::Forge),
            "neoforge" => Ok(LoaderKind::NeoForge),
            other => Err(format!("unknown loader: {other}")),
        }
    }
}

/// Metadata extracted from an archive manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    /// Mod identifier declared by the manifest (e.g. "sodium")
    pub mod_id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Supported runtime versions
    pub minecraft_version: Option<VersionConstraint>,
    /// Required loader version
    pub loader_version: Option<VersionConstraint>,
    pub loader: LoaderKind,
}

impl ArchiveMetadata {
    pub fn new(loader: LoaderKind) -> Self {
        Self {
            mod_id: None,
            name: None,
            version: None,
            description: None,
            minecraft_version: None,
            loader_version: None,
            loader,
        }
    }
}

/// Manifest dialects, one parser per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestDialect {
    /// `fabric.mod.json`
    FabricJson,
    /// `quilt.mod.json`
    QuiltJson,
    /// `META-INF/neoforge.mods.toml` or `META-INF/mods.toml`
    ModsToml,
}

impl ManifestDialect {
    /// Order in which dialects are tried
    pub const PRIORITY: [ManifestDialect; 3] = [
        ManifestDialect::FabricJson,
        ManifestDialect::QuiltJson,
        ManifestDialect::ModsToml,
    ];

    /// Read this dialect's manifest from the archive, if present and parseable
    pub fn read(&self, archive: &mut dyn ArchiveEntries) -> Option<ArchiveMetadata> {
        match self {
            ManifestDialect::FabricJson => {
                let text = archive.entry_text(fabric::MANIFEST_NAME)?;
                fabric::parse(&text)
            }
            ManifestDialect::QuiltJson => {
                let text = archive.entry_text(quilt::MANIFEST_NAME)?;
                quilt::parse(&text)
            }
            ManifestDialect::ModsToml => mods_toml::read(archive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fabric", Ok(LoaderKind::Fabric))]
    #[case("Quilt", Ok(LoaderKind::Quilt))]
    #[case("forge", Ok(LoaderKind::Forge))]
    #[case("neoforge", Ok(LoaderKind::NeoForge))]
    #[case("rift", Err("unknown loader: rift".to_string()))]
    fn loader_kind_from_str(#[case] input: &str, #[case] expected: Result<LoaderKind, String>) {
        assert_eq!(input.parse::<LoaderKind>(), expected);
    }

    #[test]
    fn loader_kind_serializes_to_registry_identifier() {
        assert_eq!(
            serde_json::to_string(&LoaderKind::NeoForge).unwrap(),
            "\"neoforge\""
        );
    }
}
