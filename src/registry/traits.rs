//! Registry trait for querying package versions and projects

#[cfg(test)]
use mockall::automock;

use crate::archive::LoaderKind;
use crate::registry::error::RegistryError;
use crate::registry::types::{ProjectInfo, SearchQuery, SearchResults, VersionRecord};

/// Parameters of a version listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    pub project_id: String,
    pub loader: Option<LoaderKind>,
    pub game_version: Option<String>,
    /// Reduce the result to the single preferred version
    pub latest_only: bool,
}

impl VersionQuery {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            loader: None,
            game_version: None,
            latest_only: false,
        }
    }

    pub fn loader(mut self, loader: Option<LoaderKind>) -> Self {
        self.loader = loader;
        self
    }

    pub fn game_version(mut self, game_version: Option<&str>) -> Self {
        self.game_version = game_version.map(str::to_string);
        self
    }

    pub fn latest_only(mut self) -> Self {
        self.latest_only = true;
        self
    }
}

/// Trait for talking to a package registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Lists versions of a project matching the query
    ///
    /// # Returns
    /// * `Ok(Vec<VersionRecord>)` - Matching versions; at most one when `latest_only` is set
    /// * `Err(RegistryError)` - `InvalidInput` for an empty project id, otherwise the fetch failure
    async fn query_versions(&self, query: &VersionQuery)
    -> Result<Vec<VersionRecord>, RegistryError>;

    /// Fetches a single version by id
    ///
    /// # Arguments
    /// * `project_id` - Expected owning project; a mismatch is reported as `NotFound`
    /// * `version_id` - Registry version id
    async fn get_version_detail(
        &self,
        project_id: Option<String>,
        version_id: &str,
    ) -> Result<VersionRecord, RegistryError>;

    /// Fetches project metadata
    async fn get_project_info(&self, project_id: &str) -> Result<ProjectInfo, RegistryError>;

    async fn search_projects(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError>;

    /// Drops every cached query
    fn invalidate_cache(&self);

    /// Drops cached queries of one project
    fn invalidate_project(&self, project_id: &str);
}
