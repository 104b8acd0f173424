//! Normalized registry records

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::LoaderKind;
use crate::layout::Side;

/// Release channel of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    #[default]
    Release,
    Beta,
    Alpha,
}

/// One downloadable file of a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
    Embedded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDependency {
    pub project_id: Option<String>,
    pub version_id: Option<String>,
    pub file_name: Option<String>,
    pub dependency_type: DependencyType,
}

/// A version as returned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    pub version_number: String,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<VersionDependency>,
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version_type: VersionType,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

impl VersionRecord {
    pub fn is_stable(&self) -> bool {
        self.version_type == VersionType::Release
    }

    /// The primary file, or the first file when none is flagged
    pub fn primary_file(&self) -> Option<&VersionFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }

    pub fn supports_loader(&self, loader: LoaderKind) -> bool {
        self.loaders.iter().any(|l| l == loader.as_str())
    }

    pub fn supports_game_version(&self, game_version: &str) -> bool {
        self.game_versions.iter().any(|v| v == game_version)
    }
}

/// How a project behaves on one side of the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SideSupport {
    Required,
    Optional,
    Unsupported,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client_side: SideSupport,
    #[serde(default)]
    pub server_side: SideSupport,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    pub icon_url: Option<String>,
}

/// Sort order for project search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchIndex {
    #[default]
    Relevance,
    Downloads,
    Follows,
    Newest,
    Updated,
}

impl SearchIndex {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchIndex::Relevance => "relevance",
            SearchIndex::Downloads => "downloads",
            SearchIndex::Follows => "follows",
            SearchIndex::Newest => "newest",
            SearchIndex::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub loader: Option<LoaderKind>,
    pub game_version: Option<String>,
    pub project_type: Option<String>,
    /// Only projects usable on this side
    pub side: Option<Side>,
    pub offset: u32,
    pub limit: u32,
    pub index: SearchIndex,
}

impl SearchQuery {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            loader: None,
            game_version: None,
            project_type: Some("mod".to_string()),
            side: None,
            offset: 0,
            limit: 20,
            index: SearchIndex::Relevance,
        }
    }

    /// Build the facet expression: inner arrays are OR-ed, the outer array AND-ed
    pub fn facets(&self) -> Vec<Vec<String>> {
        let mut facets = Vec::new();

        if let Some(loader) = self.loader {
            facets.push(vec![format!("categories:{}", loader.as_str())]);
        }
        if let Some(game_version) = &self.game_version {
            facets.push(vec![format!("versions:{game_version}")]);
        }
        if let Some(project_type) = &self.project_type {
            facets.push(vec![format!("project_type:{project_type}")]);
        }
        if let Some(side) = self.side {
            let field = match side {
                Side::Server => "server_side",
                Side::Client => "client_side",
            };
            facets.push(vec![
                format!("{field}:required"),
                format!("{field}:optional"),
            ]);
        }

        facets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub project_id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub downloads: u64,
    pub latest_version: Option<String>,
    #[serde(default)]
    pub client_side: SideSupport,
    #[serde(default)]
    pub server_side: SideSupport,
    #[serde(default)]
    pub versions: Vec<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub offset: u32,
    pub limit: u32,
    pub total_hits: u32,
}
