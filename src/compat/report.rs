//! Compatibility report over installed packages
//!
//! Every package gets exactly one status. Registry queries for all packages
//! are issued concurrently; the registry's own rate-limit gate serializes them.
//! A failing package never aborts the report.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::LoaderKind;
use crate::compat::matcher::matches;
use crate::manifest::{ManifestStore, PackageRecord, StoreError};
use crate::registry::selection::select_latest;
use crate::registry::{Registry, RegistryError, VersionQuery, VersionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompatibilityStatus {
    Compatible,
    Incompatible,
    NeedsUpdate,
    Unknown,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub file_name: String,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub current_version: Option<String>,
    pub status: CompatibilityStatus,
    pub reason: String,
    /// Suggested replacement version
    pub upgrade: Option<VersionRecord>,
    /// Set in the disabled report when the package can be enabled again
    pub re_enable: bool,
}

impl ReportEntry {
    fn new(record: &PackageRecord, status: CompatibilityStatus, reason: impl Into<String>) -> Self {
        Self {
            file_name: record.file_name.clone(),
            project_id: record.project_id.clone(),
            name: record.name.clone(),
            current_version: record.version_number.clone(),
            status,
            reason: reason.into(),
            upgrade: None,
            re_enable: false,
        }
    }

    fn with_upgrade(mut self, upgrade: Option<&VersionRecord>) -> Self {
        self.upgrade = upgrade.cloned();
        self
    }
}

/// Entries keyed and ordered by file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    pub target_runtime: String,
    pub entries: IndexMap<String, ReportEntry>,
}

impl CompatibilityReport {
    fn from_entries(target_runtime: &str, mut entries: Vec<ReportEntry>) -> Self {
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Self {
            target_runtime: target_runtime.to_string(),
            entries: entries
                .into_iter()
                .map(|entry| (entry.file_name.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, file_name: &str) -> Option<&ReportEntry> {
        self.entries.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: CompatibilityStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    /// Entries with a suggested upgrade
    pub fn upgrades(&self) -> impl Iterator<Item = (&ReportEntry, &VersionRecord)> {
        self.entries
            .values()
            .filter_map(|entry| entry.upgrade.as_ref().map(|upgrade| (entry, upgrade)))
    }
}

pub struct CompatibilityReportBuilder {
    registry: Arc<dyn Registry>,
    store: ManifestStore,
    loader: Option<LoaderKind>,
}

impl CompatibilityReportBuilder {
    pub fn new(registry: Arc<dyn Registry>, store: ManifestStore) -> Self {
        Self {
            registry,
            store,
            loader: None,
        }
    }

    /// Restrict registry queries to one loader instead of each archive's own
    pub fn with_loader(mut self, loader: Option<LoaderKind>) -> Self {
        self.loader = loader;
        self
    }

    /// Classify every enabled package against `target_runtime`
    pub async fn build_report(
        &self,
        root: &Path,
        target_runtime: &str,
    ) -> Result<CompatibilityReport, StoreError> {
        let records: Vec<PackageRecord> = self
            .store
            .read_installed(root)
            .await?
            .into_iter()
            .filter(|r| r.is_enabled())
            .collect();

        info!(
            "Checking {} packages against {}",
            records.len(),
            target_runtime
        );
        let entries = self.classify_all(&records, target_runtime).await;
        Ok(CompatibilityReport::from_entries(target_runtime, entries))
    }

    /// Classify every disabled package and flag those that can be re-enabled
    pub async fn build_disabled_report(
        &self,
        root: &Path,
        target_runtime: &str,
    ) -> Result<CompatibilityReport, StoreError> {
        let records: Vec<PackageRecord> = self
            .store
            .read_installed(root)
            .await?
            .into_iter()
            .filter(|r| r.is_disabled())
            .collect();

        let entries = self
            .classify_all(&records, target_runtime)
            .await
            .into_iter()
            .map(|mut entry| {
                entry.re_enable = matches!(
                    entry.status,
                    CompatibilityStatus::Compatible | CompatibilityStatus::NeedsUpdate
                );
                entry
            })
            .collect();
        Ok(CompatibilityReport::from_entries(target_runtime, entries))
    }

    async fn classify_all(&self, records: &[PackageRecord], target: &str) -> Vec<ReportEntry> {
        let futures = records.iter().map(|record| async move {
            let Some(project_id) = record.project_id.as_deref() else {
                return ReportEntry::new(
                    record,
                    CompatibilityStatus::Compatible,
                    "not tracked by registry",
                );
            };

            let query = VersionQuery::new(project_id)
                .loader(self.loader.or(record.loader))
                .game_version(Some(target));
            let result = self
                .registry
                .query_versions(&query)
                .await
                .inspect_err(|e| warn!("Version query for {} failed: {}", project_id, e));
            classify(record, target, result)
        });

        join_all(futures).await
    }
}

/// Decide the status of one package from the versions available for `target`
pub fn classify(
    record: &PackageRecord,
    target: &str,
    available: Result<Vec<VersionRecord>, RegistryError>,
) -> ReportEntry {
    let versions = match available {
        Ok(versions) => versions,
        Err(RegistryError::NotFound(_)) => {
            return ReportEntry::new(
                record,
                CompatibilityStatus::Unknown,
                "project not found in registry",
            );
        }
        Err(e) => return ReportEntry::new(record, CompatibilityStatus::Error, e.to_string()),
    };

    let Some(latest) = select_latest(&versions, Some(target)) else {
        return ReportEntry::new(
            record,
            CompatibilityStatus::Incompatible,
            "no versions for target runtime",
        );
    };

    let installed_listed = versions.iter().any(|v| is_installed(record, v));
    let newer = (!is_installed(record, latest)).then_some(latest);
    let declared = record
        .minecraft_version
        .as_ref()
        .map(|constraint| matches(constraint, target));
    debug!(
        "{}: declared={:?} listed={} latest={}",
        record.file_name, declared, installed_listed, latest.version_number
    );

    match (declared, installed_listed, newer) {
        (Some(false), _, Some(newer)) => ReportEntry::new(
            record,
            CompatibilityStatus::NeedsUpdate,
            format!("installed version does not support {}", target),
        )
        .with_upgrade(Some(newer)),
        (Some(false), _, None) => ReportEntry::new(
            record,
            CompatibilityStatus::Incompatible,
            format!(
                "installed version does not support {} and no other version is available",
                target
            ),
        ),
        (_, true, Some(newer)) | (Some(true), false, Some(newer)) => ReportEntry::new(
            record,
            CompatibilityStatus::NeedsUpdate,
            format!("newer version {} available", newer.version_number),
        )
        .with_upgrade(Some(newer)),
        (Some(true), _, None) | (None, true, None) => ReportEntry::new(
            record,
            CompatibilityStatus::Compatible,
            "installed version supports target runtime",
        ),
        (None, false, newer) => ReportEntry::new(
            record,
            CompatibilityStatus::Unknown,
            "no compatibility information for installed version",
        )
        .with_upgrade(newer),
    }
}

/// Whether `version` is the one installed for `record`
fn is_installed(record: &PackageRecord, version: &VersionRecord) -> bool {
    record.version_id.as_deref() == Some(version.id.as_str())
        || record.version_number.as_deref() == Some(version.version_number.as_str())
}
