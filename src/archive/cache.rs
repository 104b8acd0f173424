//! Short-lived cache for archive metadata
//!
//! Entries are keyed by `(path, minute bucket)` so a burst of reads for the
//! same archive decompresses it once. Entries from older buckets are dropped
//! lazily. Callers must call [`ArchiveMetadataCache::invalidate`] whenever the
//! file at a path is replaced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, warn};

use crate::archive::read_metadata;
use crate::archive::types::ArchiveMetadata;
use crate::config::METADATA_CACHE_BUCKET_SECS;

type CacheKey = (PathBuf, i64);

#[derive(Debug, Default)]
pub struct ArchiveMetadataCache {
    entries: Mutex<HashMap<CacheKey, Option<ArchiveMetadata>>>,
}

impl ArchiveMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_bucket() -> i64 {
        Utc::now().timestamp().div_euclid(METADATA_CACHE_BUCKET_SECS)
    }

    /// Return cached metadata for `path`, reading the archive on a miss.
    ///
    /// The zip read runs on the blocking thread pool.
    pub async fn get_or_read(&self, path: &Path) -> Option<ArchiveMetadata> {
        self.get_or_read_in_bucket(path, Self::current_bucket()).await
    }

    async fn get_or_read_in_bucket(&self, path: &Path, bucket: i64) -> Option<ArchiveMetadata> {
        let key = (path.to_path_buf(), bucket);

        if let Ok(entries) = self.entries.lock()
            && let Some(cached) = entries.get(&key)
        {
            return cached.clone();
        }

        let archive = key.0.clone();
        let metadata = tokio::task::spawn_blocking(move || read_metadata(&archive))
            .await
            .inspect_err(|e| warn!("Archive read task for {:?} failed: {}", path, e))
            .ok()
            .flatten();

        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|(_, entry_bucket), _| *entry_bucket >= bucket);
            entries.insert(key, metadata.clone());
        }

        metadata
    }

    /// Drop every cached entry for `path`
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|(entry_path, _), _| entry_path != path);
            debug!("Invalidated archive metadata cache for {:?}", path);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
