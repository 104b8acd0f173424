//! In-memory cache of filtered version queries

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::archive::LoaderKind;
use crate::registry::types::VersionRecord;

/// Identity of a version query; `latest_only` is deliberately absent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub project_id: String,
    pub loader: Option<LoaderKind>,
    pub game_version: Option<String>,
}

impl QueryKey {
    pub fn new(project_id: &str, loader: Option<LoaderKind>, game_version: Option<&str>) -> Self {
        Self {
            project_id: project_id.to_string(),
            loader,
            game_version: game_version.map(str::to_string),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    versions: Vec<VersionRecord>,
    stored_at: Instant,
}

#[derive(Debug, Default)]
pub struct VersionCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    ttl: Option<Duration>,
}

impl VersionCache {
    /// Create a cache; `ttl` of `None` keeps entries until invalidated
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Vec<VersionRecord>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;

        if let Some(ttl) = self.ttl
            && entry.stored_at.elapsed() > ttl
        {
            debug!("Version cache entry expired for {}", key.project_id);
            return None;
        }

        Some(entry.versions.clone())
    }

    pub fn insert(&self, key: QueryKey, versions: Vec<VersionRecord>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    versions,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            debug!("Clearing {} cached version queries", entries.len());
            entries.clear();
        }
    }

    /// Drop every cached query for one project
    pub fn invalidate_project(&self, project_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| key.project_id != project_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::VersionType;

    fn version(id: &str, project_id: &str) -> VersionRecord {
        VersionRecord {
            id: id.to_string(),
            project_id: project_id.to_string(),
            name: String::new(),
            version_number: "1.0.0".to_string(),
            game_versions: vec!["1.20.1".to_string()],
            loaders: vec!["fabric".to_string()],
            dependencies: vec![],
            date_published: None,
            version_type: VersionType::Release,
            files: vec![],
        }
    }

    #[test]
    fn get_returns_inserted_versions() {
        let cache = VersionCache::new(None);
        let key = QueryKey::new("AABBCCDD", Some(LoaderKind::Fabric), Some("1.20.1"));

        cache.insert(key.clone(), vec![version("v1", "AABBCCDD")]);

        assert_eq!(cache.get(&key), Some(vec![version("v1", "AABBCCDD")]));
    }

    #[test]
    fn keys_differ_by_loader_and_game_version() {
        let cache = VersionCache::new(None);
        cache.insert(
            QueryKey::new("AABBCCDD", Some(LoaderKind::Fabric), Some("1.20.1")),
            vec![version("v1", "AABBCCDD")],
        );

        assert_eq!(
            cache.get(&QueryKey::new("AABBCCDD", Some(LoaderKind::Forge), Some("1.20.1"))),
            None
        );
        assert_eq!(
            cache.get(&QueryKey::new("AABBCCDD", Some(LoaderKind::Fabric), None)),
            None
        );
    }

    #[test]
    fn invalidate_project_keeps_other_projects() {
        let cache = VersionCache::new(None);
        let kept = QueryKey::new("KEEPKEEP", None, None);
        cache.insert(QueryKey::new("DROPDROP", None, None), vec![]);
        cache.insert(QueryKey::new("DROPDROP", None, Some("1.20.1")), vec![]);
        cache.insert(kept.clone(), vec![]);

        cache.invalidate_project("DROPDROP");

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&kept).is_some());
    }

    #[test]
    fn invalidate_all_empties_cache() {
        let cache = VersionCache::new(None);
        cache.insert(QueryKey::new("AABBCCDD", None, None), vec![]);

        cache.invalidate_all();

        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = VersionCache::new(Some(Duration::from_millis(10)));
        let key = QueryKey::new("AABBCCDD", None, None);
        cache.insert(key.clone(), vec![]);

        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get(&key), None);
    }
}
