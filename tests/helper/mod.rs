//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use zip::write::SimpleFileOptions;

use modsync::registry::selection::{apply_latest_only, filter_versions};
use modsync::registry::{
    ProjectInfo, Registry, RegistryError, SearchQuery, SearchResults, VersionFile, VersionQuery,
    VersionRecord, VersionType,
};

/// In-memory registry keyed by project id
#[derive(Default)]
pub struct MockRegistry {
    versions: HashMap<String, Vec<VersionRecord>>,
    queries: AtomicUsize,
    invalidated: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, project_id: &str, versions: Vec<VersionRecord>) -> Self {
        self.versions.insert(project_id.to_string(), versions);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn query_versions(
        &self,
        query: &VersionQuery,
    ) -> Result<Vec<VersionRecord>, RegistryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let versions = self
            .versions
            .get(&query.project_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(query.project_id.clone()))?;
        let filtered = filter_versions(versions, query.loader, query.game_version.as_deref());
        Ok(apply_latest_only(
            filtered,
            query.game_version.as_deref(),
            query.latest_only,
        ))
    }

    async fn get_version_detail(
        &self,
        project_id: Option<String>,
        version_id: &str,
    ) -> Result<VersionRecord, RegistryError> {
        self.versions
            .values()
            .flatten()
            .find(|v| v.id == version_id)
            .filter(|v| project_id.as_deref().is_none_or(|p| p == v.project_id))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(version_id.to_string()))
    }

    async fn get_project_info(&self, project_id: &str) -> Result<ProjectInfo, RegistryError> {
        Err(RegistryError::NotFound(project_id.to_string()))
    }

    async fn search_projects(&self, query: &SearchQuery) -> Result<SearchResults, RegistryError> {
        Ok(SearchResults {
            hits: vec![],
            offset: query.offset,
            limit: query.limit,
            total_hits: 0,
        })
    }

    fn invalidate_cache(&self) {}

    fn invalidate_project(&self, project_id: &str) {
        if let Ok(mut ids) = self.invalidated.lock() {
            ids.push(project_id.to_string());
        }
    }
}

/// A stable fabric version published on `2024-01-<day>`
pub fn version(
    project_id: &str,
    id: &str,
    number: &str,
    game_versions: &[&str],
    day: u32,
    url: &str,
) -> VersionRecord {
    VersionRecord {
        id: id.to_string(),
        project_id: project_id.to_string(),
        name: number.to_string(),
        version_number: number.to_string(),
        game_versions: game_versions.iter().map(|v| v.to_string()).collect(),
        loaders: vec!["fabric".to_string()],
        dependencies: vec![],
        date_published: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
        version_type: VersionType::Release,
        files: vec![VersionFile {
            url: url.to_string(),
            filename: format!("{}-{}.jar", project_id.to_lowercase(), number),
            primary: true,
            size: 0,
            hashes: HashMap::new(),
        }],
    }
}

/// Bytes of a jar carrying a fabric.mod.json
pub fn fabric_jar(id: &str, version: &str, minecraft: Option<&str>) -> Vec<u8> {
    let depends = minecraft
        .map(|m| format!(r#", "depends": {{ "minecraft": "{m}" }}"#))
        .unwrap_or_default();
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("fabric.mod.json", SimpleFileOptions::default())
        .unwrap();
    write!(
        writer,
        r#"{{ "id": "{id}", "name": "{id}", "version": "{version}"{depends} }}"#
    )
    .unwrap();
    writer.finish().unwrap().into_inner()
}

/// Write `bytes` to `<root>/<relative>`, creating parent directories
pub fn write_file(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Write a server-side sidecar for `file_name`
pub fn write_sidecar(root: &Path, file_name: &str, json: &str) {
    write_file(
        root,
        &format!("minecraft-core-manifests/{file_name}.json"),
        json.as_bytes(),
    );
}
