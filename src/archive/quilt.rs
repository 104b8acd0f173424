//! quilt.mod.json parser

use serde::Deserialize;

use crate::archive::fabric::parse_lenient_json;
use crate::archive::normalize_constraint;
use crate::archive::types::{ArchiveMetadata, LoaderKind};
use crate::compat::matcher::VersionConstraint;

pub const MANIFEST_NAME: &str = "quilt.mod.json";

#[derive(Debug, Deserialize)]
struct QuiltModJson {
    quilt_loader: QuiltLoader,
}

#[derive(Debug, Deserialize)]
struct QuiltLoader {
    id: Option<String>,
    version: Option<String>,
    #[serde(default)]
    metadata: QuiltMetadata,
    #[serde(default)]
    depends: Vec<QuiltDependency>,
}

#[derive(Debug, Default, Deserialize)]
struct QuiltMetadata {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuiltDependency {
    /// Bare mod id, any version
    Id(String),
    Full {
        id: String,
        versions: Option<QuiltVersions>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuiltVersions {
    Constraint(VersionConstraint),
    Any { any: Vec<String> },
    All { all: Vec<String> },
}

impl QuiltVersions {
    fn into_constraint(self) -> Option<VersionConstraint> {
        match self {
            QuiltVersions::Constraint(constraint) => normalize_constraint(constraint),
            QuiltVersions::Any { any } => normalize_constraint(VersionConstraint::AnyOf(
                any.into_iter().map(VersionConstraint::One).collect(),
            )),
            // Every bound must hold: join into one space-separated range
            QuiltVersions::All { all } => {
                let joined = all.join(" ");
                normalize_constraint(VersionConstraint::One(joined))
            }
        }
    }
}

impl QuiltDependency {
    fn id(&self) -> &str {
        match self {
            QuiltDependency::Id(id) | QuiltDependency::Full { id, .. } => id,
        }
    }

    fn into_constraint(self) -> Option<VersionConstraint> {
        match self {
            QuiltDependency::Id(_) => Some(VersionConstraint::One("*".to_string())),
            QuiltDependency::Full { versions, .. } => match versions {
                Some(versions) => versions.into_constraint(),
                None => Some(VersionConstraint::One("*".to_string())),
            },
        }
    }
}

/// Parse a quilt.mod.json document
pub fn parse(content: &str) -> Option<ArchiveMetadata> {
    let manifest: QuiltModJson = parse_lenient_json(content)?;
    let loader = manifest.quilt_loader;

    let mut minecraft_version = None;
    let mut loader_version = None;
    for dependency in loader.depends {
        let id = dependency.id().to_string();
        match id.as_str() {
            "minecraft" => minecraft_version = dependency.into_constraint(),
            "quilt_loader" => loader_version = dependency.into_constraint(),
            _ => {}
        }
    }

    Some(ArchiveMetadata {
        mod_id: loader.id,
        name: loader.metadata.name,
        version: loader.version,
        description: loader.metadata.description,
        minecraft_version,
        loader_version,
        loader: LoaderKind::Quilt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_reads_nested_loader_object() {
        let content = r#"{
            "schema_version": 1,
            "quilt_loader": {
                "group": "org.example",
                "id": "example_mod",
                "version": "2.1.0",
                "metadata": { "name": "Example Mod", "description": "An example" },
                "depends": [
                    { "id": "quilt_loader", "versions": ">=0.19.0" },
                    { "id": "minecraft", "versions": ">=1.20" },
                    "quilted_fabric_api"
                ]
            }
        }"#;

        let metadata = parse(content).unwrap();

        assert_eq!(
            metadata,
            ArchiveMetadata {
                mod_id: Some("example_mod".to_string()),
                name: Some("Example Mod".to_string()),
                version: Some("2.1.0".to_string()),
                description: Some("An example".to_string()),
                minecraft_version: Some(VersionConstraint::One(">=1.20".to_string())),
                loader_version: Some(VersionConstraint::One(">=0.19.0".to_string())),
                loader: LoaderKind::Quilt,
            }
        );
    }

    #[rstest]
    #[case(r#"["1.20.1", "1.20.2"]"#, VersionConstraint::One(">=1.20.1 <=1.20.2".into()))]
    #[case(r#"{ "any": ["1.20.1"] }"#, VersionConstraint::One("1.20.1".into()))]
    #[case(r#"{ "all": [">=1.20", "<1.21"] }"#, VersionConstraint::One(">=1.20 <1.21".into()))]
    fn parse_accepts_version_shapes(#[case] versions: &str, #[case] expected: VersionConstraint) {
        let content = format!(
            r#"{{ "quilt_loader": {{ "id": "m", "depends": [{{ "id": "minecraft", "versions": {versions} }}] }} }}"#
        );

        let metadata = parse(&content).unwrap();

        assert_eq!(metadata.minecraft_version, Some(expected));
    }

    #[test]
    fn parse_returns_none_without_quilt_loader_object() {
        assert_eq!(parse(r#"{ "id": "not-quilt" }"#), None);
    }
}
