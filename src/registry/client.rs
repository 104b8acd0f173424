//! HTTP client for the Modrinth-style registry API

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::registry::cache::{QueryKey, VersionCache};
use crate::registry::error::RegistryError;
use crate::registry::gate::RateLimitGate;
use crate::registry::retry::RetryPolicy;
use crate::registry::selection::{apply_latest_only, filter_versions};
use crate::registry::traits::{Registry, VersionQuery};
use crate::registry::types::{ProjectInfo, SearchQuery, SearchResults, VersionRecord};

const USER_AGENT: &str = concat!("modsync/", env!("CARGO_PKG_VERSION"));

/// Rate-limited, retrying and caching registry client.
///
/// Every outbound request (including retries) passes through one shared
/// [`RateLimitGate`]. Version listings are cached per
/// `(project, loader, game version)` for the lifetime of the client.
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    gate: RateLimitGate,
    retry: RetryPolicy,
    cache: VersionCache,
}

impl RegistryClient {
    /// Creates a client with default settings against a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self::with_config(&RegistryConfig {
            base_url: base_url.to_string(),
            ..RegistryConfig::default()
        })
    }

    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(config.timeout())
                .build()
                .expect("Failed to create HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            gate: RateLimitGate::new(config.rate_limit()),
            retry: RetryPolicy::from_config(config),
            cache: VersionCache::new(config.cache_ttl()),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, RegistryError> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        url.map_err(|e| RegistryError::InvalidInput(format!("invalid URL {}: {}", raw, e)))
    }

    /// GET `url` and decode the JSON body, behind the gate and retry policy
    async fn get_json<T: DeserializeOwned>(&self, url: Url, resource: &str) -> Result<T, RegistryError> {
        let url = &url;
        self.retry
            .run(resource, || async move {
                self.gate.wait().await;
                self.fetch_once(url, resource).await
            })
            .await
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &Url, resource: &str) -> Result<T, RegistryError> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(resource.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(RegistryError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status.is_server_error() {
            warn!("Registry returned status {}: {}", status, url);
            return Err(RegistryError::Network(format!("Server error: {}", status)));
        }

        if !status.is_success() {
            warn!("Registry returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                return RegistryError::NetworkTimeout(e.to_string());
            }
            warn!("Failed to parse registry response for {}: {}", resource, e);
            RegistryError::InvalidResponse(e.to_string())
        })
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::with_config(&RegistryConfig::default())
    }
}

/// Reject ids that are empty or would escape their path segment
fn validate_id<'a>(kind: &str, id: &'a str) -> Result<&'a str, RegistryError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(RegistryError::InvalidInput(format!("missing {}", kind)));
    }
    if id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(RegistryError::InvalidInput(format!("malformed {}: {}", kind, id)));
    }
    Ok(id)
}

fn json_list(value: &str) -> String {
    serde_json::json!([value]).to_string()
}

#[async_trait::async_trait]
impl Registry for RegistryClient {
    async fn query_versions(
        &self,
        query: &VersionQuery,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        let project_id = validate_id("project id", &query.project_id)?;
        let game_version = query.game_version.as_deref();
        let key = QueryKey::new(project_id, query.loader, game_version);

        if let Some(cached) = self.cache.get(&key) {
            debug!("Version cache hit for {}", project_id);
            return Ok(apply_latest_only(cached, game_version, query.latest_only));
        }

        let mut params = Vec::new();
        if let Some(loader) = query.loader {
            params.push(("loaders", json_list(loader.as_str())));
        }
        if let Some(game_version) = game_version {
            params.push(("game_versions", json_list(game_version)));
        }
        let url = self.endpoint(&format!("/project/{}/version", project_id), &params)?;

        let versions: Vec<VersionRecord> = self.get_json(url, project_id).await?;
        let filtered = filter_versions(versions, query.loader, game_version);
        debug!(
            "Fetched {} matching versions for {}",
            filtered.len(),
            project_id
        );

        self.cache.insert(key, filtered.clone());
        Ok(apply_latest_only(filtered, game_version, query.latest_only))
    }

    async fn get_version_detail(
        &self,
        project_id: Option<String>,
        version_id: &str,
    ) -> Result<VersionRecord, RegistryError> {
        let version_id = validate_id("version id", version_id)?;
        let url = self.endpoint(&format!("/version/{}", version_id), &[])?;

        let version: VersionRecord = self.get_json(url, version_id).await?;

        if let Some(expected) = project_id.as_deref()
            && !expected.is_empty()
            && version.project_id != expected
        {
            warn!(
                "Version {} belongs to {}, not {}",
                version_id, version.project_id, expected
            );
            return Err(RegistryError::NotFound(format!(
                "{} (project {})",
                version_id, expected
            )));
        }

        Ok(version)
    }

    async fn get_project_info(&self, project_id: &str) -> Result<ProjectInfo, RegistryError> {
        let project_id = validate_id("project id", project_id)?;
        let url = self.endpoint(&format!("/project/{}", project_id), &[])?;
        self.get_json(url, project_id).await
    }

    async fn search_projects(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError> {
        let mut params = vec![
            ("query", query.query.clone()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
            ("index", query.index.as_str().to_string()),
        ];
        let facets = query.facets();
        if !facets.is_empty() {
            params.push(("facets", serde_json::json!(facets).to_string()));
        }
        let url = self.endpoint("/search", &params)?;
        self.get_json(url, "search").await
    }

    fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    fn invalidate_project(&self, project_id: &str) {
        self.cache.invalidate_project(project_id);
    }
}
