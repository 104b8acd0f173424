//! Reading installed packages and maintaining their sidecars.
//!
//! The disk is the only source of truth: every read re-probes the
//! filesystem and re-extracts archive metadata (through the short-lived
//! archive cache).

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::archive::ArchiveMetadataCache;
use crate::layout::{
    InstallationLayout, Location, MANIFEST_DIR, MODS_DIR, Side, Slot, list_archives,
};
use crate::manifest::error::StoreError;
use crate::manifest::record::PackageRecord;
use crate::manifest::sidecar::{Sidecar, SidecarFields};

#[derive(Debug, Default, Clone)]
pub struct ManifestStore {
    archive_cache: Arc<ArchiveMetadataCache>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an archive cache with other components (the install pipeline
    /// invalidates entries after replacing a file)
    pub fn with_cache(archive_cache: Arc<ArchiveMetadataCache>) -> Self {
        Self { archive_cache }
    }

    pub fn archive_cache(&self) -> &Arc<ArchiveMetadataCache> {
        &self.archive_cache
    }

    /// Read every package installed under `root`, server and client sides
    /// combined, ordered by file name
    pub async fn read_installed(&self, root: &Path) -> Result<Vec<PackageRecord>, StoreError> {
        let layout = InstallationLayout::new(root);

        let mut names = BTreeSet::new();
        for dir in [
            layout.mods_dir(Side::Server),
            layout.mods_dir(Side::Client),
            layout.legacy_disabled_dir(),
        ] {
            for (name, _) in list_archives(&dir)
                .await
                .map_err(|e| StoreError::io(&dir, e))?
            {
                names.insert(name);
            }
        }

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            if let Some(record) = self.read_record(root, &name).await? {
                records.push(record);
            }
        }

        debug!("Read {} installed packages under {:?}", records.len(), root);
        Ok(records)
    }

    /// Read packages from a standalone client tree (`<client_root>/mods`)
    pub async fn read_installed_at_client(
        &self,
        client_root: &Path,
    ) -> Result<Vec<PackageRecord>, StoreError> {
        let mods_dir = client_root.join(MODS_DIR);

        let mut by_name: BTreeMap<String, BTreeSet<Location>> = BTreeMap::new();
        for (name, disabled) in list_archives(&mods_dir)
            .await
            .map_err(|e| StoreError::io(&mods_dir, e))?
        {
            let location = if disabled {
                Location::Disabled
            } else {
                Location::Client
            };
            by_name.entry(name).or_default().insert(location);
        }

        let mut records = Vec::with_capacity(by_name.len());
        for (name, locations) in by_name {
            let archive = if locations.contains(&Location::Client) {
                mods_dir.join(&name)
            } else {
                mods_dir.join(format!("{}{}", name, crate::layout::DISABLED_SUFFIX))
            };
            let metadata = self.archive_cache.get_or_read(&archive).await;
            let sidecar = self.read_sidecar(client_root, &name).await?;
            records.push(PackageRecord::merge(&name, sidecar, metadata, locations));
        }

        Ok(records)
    }

    /// Build the record for one file name, or `None` when no archive exists
    pub async fn read_record(
        &self,
        root: &Path,
        file_name: &str,
    ) -> Result<Option<PackageRecord>, StoreError> {
        let layout = InstallationLayout::new(root);
        let slots = layout.occupied_slots(file_name).await;

        // Probe order is the BTreeSet order of `Slot`
        let Some(&primary) = slots.iter().next() else {
            return Ok(None);
        };

        let locations: BTreeSet<Location> = slots.iter().map(|s| s.location()).collect();
        let metadata = self
            .archive_cache
            .get_or_read(&layout.archive_path(primary, file_name))
            .await;
        let sidecar = self.read_sidecar_for_slots(&layout, file_name, &slots).await?;

        Ok(Some(PackageRecord::merge(
            file_name, sidecar, metadata, locations,
        )))
    }

    /// Sidecar on the primary side first, then the other side
    async fn read_sidecar_for_slots(
        &self,
        layout: &InstallationLayout,
        file_name: &str,
        slots: &BTreeSet<Slot>,
    ) -> Result<Option<Sidecar>, StoreError> {
        let first_side = slots.iter().next().map(|s| s.side()).unwrap_or(Side::Server);
        for side in [first_side, first_side.other()] {
            if let Some(sidecar) = self.read_sidecar(&layout.side_root(side), file_name).await? {
                return Ok(Some(sidecar));
            }
        }
        Ok(None)
    }

    /// Read the sidecar of `file_name` under a side root.
    ///
    /// A malformed sidecar is logged and treated as absent.
    pub async fn read_sidecar(
        &self,
        side_root: &Path,
        file_name: &str,
    ) -> Result<Option<Sidecar>, StoreError> {
        let path = sidecar_path(side_root, file_name)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        match serde_json::from_str::<Sidecar>(&content) {
            Ok(sidecar) => Ok(Some(sidecar)),
            Err(e) => {
                warn!("Ignoring malformed sidecar {:?}: {}", path, e);
                Ok(None)
            }
        }
    }

    /// Create or merge the sidecar of `file_name` under a side root.
    ///
    /// Provided fields overwrite, absent fields keep their previous values,
    /// `updatedAt` is refreshed.
    pub async fn write_sidecar(
        &self,
        side_root: &Path,
        file_name: &str,
        fields: SidecarFields,
    ) -> Result<Sidecar, StoreError> {
        let path = sidecar_path(side_root, file_name)?;

        let mut sidecar = self
            .read_sidecar(side_root, file_name)
            .await?
            .unwrap_or_else(|| Sidecar::new(file_name));
        sidecar.file_name = file_name.to_string();
        sidecar.merge(fields);

        let content = serde_json::to_string_pretty(&sidecar).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!("Wrote sidecar {:?}", path);
        Ok(sidecar)
    }

    /// Delete the sidecar of `file_name`; returns whether one existed
    pub async fn remove_sidecar(&self, side_root: &Path, file_name: &str) -> Result<bool, StoreError> {
        let path = sidecar_path(side_root, file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

fn sidecar_path(side_root: &Path, file_name: &str) -> Result<PathBuf, StoreError> {
    validate_file_name(file_name)?;
    Ok(side_root.join(MANIFEST_DIR).join(format!("{}.json", file_name)))
}

/// Reject names that would resolve outside their directory
pub fn validate_file_name(file_name: &str) -> Result<(), StoreError> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\']);
    if invalid {
        return Err(StoreError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}
