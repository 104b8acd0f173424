//! Install or update a single package

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveMetadataCache, LoaderKind};
use crate::install::download::{DownloadTask, Downloader};
use crate::install::error::InstallError;
use crate::install::filename::{derive_file_name, file_name_from_url};
use crate::install::progress::{NoopReporter, ProgressReporter};
use crate::layout::{Category, InstallationLayout, Side, Slot};
use crate::manifest::{ManifestStore, SidecarFields, validate_file_name};
use crate::reconcile::LocationReconciler;
use crate::reconcile::reconciler::copy_file;
use crate::registry::{Registry, VersionQuery, VersionRecord};

const DEFAULT_SOURCE: &str = "modrinth";

/// What to install; every field is optional but a project id or a download
/// URL must be present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageDetails {
    pub project_id: Option<String>,
    pub version_id: Option<String>,
    pub name: Option<String>,
    pub version_number: Option<String>,
    pub download_url: Option<String>,
    /// Registry file name of the download
    pub file_name: Option<String>,
    pub loader: Option<LoaderKind>,
    pub game_version: Option<String>,
    /// Placement for a fresh install; updates keep the current placement
    pub category: Option<Category>,
    /// File being replaced by an update
    pub existing_file_name: Option<String>,
    pub source: Option<String>,
}

impl PackageDetails {
    /// Replace `existing_file_name` with the primary file of `upgrade`
    pub fn for_upgrade(existing_file_name: &str, upgrade: &VersionRecord) -> Self {
        let file = upgrade.primary_file();
        Self {
            project_id: Some(upgrade.project_id.clone()),
            version_id: Some(upgrade.id.clone()),
            version_number: Some(upgrade.version_number.clone()),
            download_url: file.map(|f| f.url.clone()),
            file_name: file.map(|f| f.filename.clone()),
            existing_file_name: Some(existing_file_name.to_string()),
            ..Self::default()
        }
    }

    /// First of project id, existing file name, name and download URL
    pub fn identifier(&self) -> Option<&str> {
        [
            &self.project_id,
            &self.existing_file_name,
            &self.name,
            &self.download_url,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|id| !id.trim().is_empty())
    }

    pub fn label(&self) -> String {
        self.identifier().unwrap_or("<unnamed>").to_string()
    }

    pub fn is_update(&self) -> bool {
        self.existing_file_name.is_some()
    }
}

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackage {
    pub file_name: String,
    pub previous_file_name: Option<String>,
    pub project_id: Option<String>,
    pub version_id: Option<String>,
    pub version_number: Option<String>,
    pub name: Option<String>,
    pub category: Category,
    pub bytes: u64,
}

/// Boundary shape of an install result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub file_name: Option<String>,
    pub project_id: Option<String>,
    pub version_number: Option<String>,
    pub category: Option<Category>,
}

impl From<Result<InstalledPackage, InstallError>> for InstallOutcome {
    fn from(result: Result<InstalledPackage, InstallError>) -> Self {
        match result {
            Ok(installed) => Self {
                success: true,
                error: None,
                file_name: Some(installed.file_name),
                project_id: installed.project_id,
                version_number: installed.version_number,
                category: Some(installed.category),
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                file_name: None,
                project_id: None,
                version_number: None,
                category: None,
            },
        }
    }
}

/// A download location resolved from the details or the registry
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedDownload {
    url: String,
    registry_file_name: Option<String>,
    version: Option<VersionRecord>,
}

pub struct InstallationPipeline {
    registry: Arc<dyn Registry>,
    downloader: Downloader,
    store: ManifestStore,
    reconciler: LocationReconciler,
    reporter: Arc<dyn ProgressReporter>,
}

impl InstallationPipeline {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        let archive_cache = Arc::new(ArchiveMetadataCache::new());
        Self {
            registry,
            downloader: Downloader::default(),
            store: ManifestStore::with_cache(Arc::clone(&archive_cache)),
            reconciler: LocationReconciler::with_cache(archive_cache),
            reporter: Arc::new(NoopReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = downloader;
        self
    }

    /// Use a shared archive cache (e.g. the one behind a `ManifestStore`)
    pub fn with_archive_cache(mut self, archive_cache: Arc<ArchiveMetadataCache>) -> Self {
        self.store = ManifestStore::with_cache(Arc::clone(&archive_cache));
        self.reconciler = LocationReconciler::with_cache(archive_cache);
        self
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn reconciler(&self) -> &LocationReconciler {
        &self.reconciler
    }

    /// Install and fold the result into an [`InstallOutcome`]
    pub async fn install(&self, root: &Path, details: PackageDetails) -> InstallOutcome {
        let label = details.label();
        let result = self.try_install(root, details).await;
        if let Err(e) = &result {
            warn!("Install of {} failed: {}", label, e);
        }
        result.into()
    }

    pub async fn try_install(
        &self,
        root: &Path,
        details: PackageDetails,
    ) -> Result<InstalledPackage, InstallError> {
        validate(&details)?;
        let layout = InstallationLayout::new(root);
        let label = details.label();

        let resolved = self.resolve_download(&details).await?;
        let version = resolved.version.as_ref();

        let project_id = details
            .project_id
            .clone()
            .or_else(|| version.map(|v| v.project_id.clone()));
        let version_id = details
            .version_id
            .clone()
            .or_else(|| version.map(|v| v.id.clone()));
        let version_number = details
            .version_number
            .clone()
            .or_else(|| version.map(|v| v.version_number.clone()));
        let name = match details.name.clone() {
            Some(name) => Some(name),
            None => self.project_title(project_id.as_deref()).await,
        };

        let previous = details.existing_file_name.clone();
        let display_file_name = derive_file_name(name.as_deref(), version_number.as_deref());
        let mut file_name = match &previous {
            Some(existing) => details.file_name.clone().unwrap_or_else(|| existing.clone()),
            None => display_file_name.clone()
                .or_else(|| resolved.registry_file_name.clone())
                .or_else(|| file_name_from_url(&resolved.url))
                .ok_or_else(|| InstallError::InvalidInput(format!("no file name for {}", label)))?,
        };
        validate_file_name(&file_name).map_err(|e| InstallError::InvalidInput(e.to_string()))?;

        // A fresh install of a name already on disk replaces it where it sits
        let current_name = previous.clone().unwrap_or_else(|| file_name.clone());
        let reinstall = previous.is_none() && !layout.occupied_slots(&file_name).await.is_empty();
        // Names taken from the registry or the URL may be replaced by one built from the archive
        let renamable = !details.is_update() && !reinstall && display_file_name.is_none();

        let category = self.placement(root, &details, &current_name).await;
        let mut targets = target_slots_for(&layout, category, Some(&current_name)).await;
        let Some(&primary) = targets.iter().next() else {
            return Err(InstallError::InvalidInput(format!("no target for {}", label)));
        };

        let task = DownloadTask {
            id: project_id.clone().unwrap_or_else(|| label.clone()),
            name: name.clone().unwrap_or_else(|| file_name.clone()),
        };
        info!("Installing {} as {} ({})", label, file_name, category);

        let mut primary_path = layout.archive_path(primary, &file_name);
        let bytes = self
            .downloader
            .download(&resolved.url, &primary_path, &task, self.reporter.as_ref())
            .await?;
        self.store.archive_cache().invalidate(&primary_path);

        if renamable
            && let Some(cleaner) = self.cleaner_file_name(&primary_path).await
            && cleaner != file_name
            && !layout.archive_path(primary, &cleaner).exists()
        {
            let cleaner_path = layout.archive_path(primary, &cleaner);
            tokio::fs::rename(&primary_path, &cleaner_path)
                .await
                .map_err(|e| InstallError::filesystem(&primary_path, e))?;
            debug!("Renamed {} to {} from archive metadata", file_name, cleaner);
            self.store.archive_cache().invalidate(&primary_path);
            file_name = cleaner;
            primary_path = cleaner_path;
        }

        targets.remove(&primary);
        for slot in &targets {
            let path = layout.archive_path(*slot, &file_name);
            copy_file(&primary_path, &path).await?;
            self.store.archive_cache().invalidate(&path);
        }
        targets.insert(primary);

        self.remove_stale(&layout, &current_name, &file_name, &targets)
            .await?;

        let fields = SidecarFields {
            project_id: project_id.clone(),
            name: name.clone(),
            version_id: version_id.clone(),
            version_number: version_number.clone(),
            source: Some(
                details
                    .source
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            ),
            minecraft_version: None,
        };
        let sides: BTreeSet<Side> = targets.iter().map(|slot| slot.side()).collect();
        for side in sides {
            self.store
                .write_sidecar(&layout.side_root(side), &file_name, fields.clone())
                .await?;
        }

        if let Some(project_id) = &project_id {
            self.registry.invalidate_project(project_id);
        }

        info!("Installed {} ({} bytes)", file_name, bytes);
        Ok(InstalledPackage {
            file_name,
            previous_file_name: previous,
            project_id,
            version_id,
            version_number,
            name,
            category,
            bytes,
        })
    }

    async fn resolve_download(&self, details: &PackageDetails) -> Result<ResolvedDownload, InstallError> {
        if let Some(url) = details.download_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(ResolvedDownload {
                url: url.to_string(),
                registry_file_name: details.file_name.clone(),
                version: None,
            });
        }

        let label = details.label();
        let version = match (&details.project_id, &details.version_id) {
            (_, Some(version_id)) => {
                self.registry
                    .get_version_detail(details.project_id.clone(), version_id)
                    .await?
            }
            (Some(project_id), None) => {
                let query = VersionQuery::new(project_id)
                    .loader(details.loader)
                    .game_version(details.game_version.as_deref())
                    .latest_only();
                self.registry
                    .query_versions(&query)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| InstallError::NoDownloadUrl(label.clone()))?
            }
            (None, None) => return Err(InstallError::NoDownloadUrl(label)),
        };

        let file = version
            .primary_file()
            .ok_or_else(|| InstallError::NoDownloadUrl(label.clone()))?;
        Ok(ResolvedDownload {
            url: file.url.clone(),
            registry_file_name: Some(file.filename.clone()),
            version: Some(version.clone()),
        })
    }

    async fn project_title(&self, project_id: Option<&str>) -> Option<String> {
        let project_id = project_id?;
        self.registry
            .get_project_info(project_id)
            .await
            .inspect_err(|e| debug!("No project info for {}: {}", project_id, e))
            .ok()
            .map(|info| info.title)
            .filter(|title| !title.is_empty())
    }

    /// Current placement of `current_name` on disk, else the requested one
    async fn placement(
        &self,
        root: &Path,
        details: &PackageDetails,
        current_name: &str,
    ) -> Category {
        if let Some(current) = self.reconciler.current_category(root, current_name).await {
            return current;
        }
        details.category.unwrap_or(Category::ServerOnly)
    }

    async fn cleaner_file_name(&self, archive: &Path) -> Option<String> {
        let metadata = self.store.archive_cache().get_or_read(archive).await?;
        derive_file_name(metadata.name.as_deref(), metadata.version.as_deref())
    }

    /// Delete copies of the previous file name that the new file does not occupy
    async fn remove_stale(
        &self,
        layout: &InstallationLayout,
        previous: &str,
        file_name: &str,
        targets: &BTreeSet<Slot>,
    ) -> Result<(), InstallError> {
        let same_name = previous == file_name;
        for slot in layout.occupied_slots(previous).await {
            if same_name && targets.contains(&slot) {
                continue;
            }
            let path = layout.archive_path(slot, previous);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| InstallError::filesystem(&path, e))?;
            self.store.archive_cache().invalidate(&path);
            debug!("Removed stale copy {:?}", path);
        }

        if !same_name {
            for side in [Side::Server, Side::Client] {
                self.store
                    .remove_sidecar(&layout.side_root(side), previous)
                    .await?;
            }
        }
        Ok(())
    }
}

fn validate(details: &PackageDetails) -> Result<(), InstallError> {
    let has_project = details
        .project_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    let has_url = details
        .download_url
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());
    if !has_project && !has_url {
        return Err(InstallError::InvalidInput(
            "a project id or a download URL is required".to_string(),
        ));
    }
    for name in [&details.existing_file_name, &details.file_name]
        .into_iter()
        .flatten()
    {
        validate_file_name(name).map_err(|e| InstallError::InvalidInput(e.to_string()))?;
    }
    Ok(())
}

/// Slots the new archive is written to for `category`.
///
/// A disabled update stays disabled on the sides that held the previous file.
async fn target_slots_for(
    layout: &InstallationLayout,
    category: Category,
    previous: Option<&str>,
) -> BTreeSet<Slot> {
    match category {
        Category::ServerOnly => BTreeSet::from([Slot::ServerEnabled]),
        Category::ClientOnly => BTreeSet::from([Slot::ClientEnabled]),
        Category::Both => BTreeSet::from([Slot::ServerEnabled, Slot::ClientEnabled]),
        Category::Disabled => {
            let mut slots = BTreeSet::new();
            if let Some(previous) = previous {
                for slot in layout.occupied_slots(previous).await {
                    slots.insert(Slot::disabled(slot.side()));
                }
            }
            if slots.is_empty() {
                slots.insert(Slot::ServerDisabled);
            }
            slots
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MockRegistry, RegistryError, VersionFile, VersionType};
    use mockito::Server;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn fabric_jar(id: &str, name: &str, version: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("fabric.mod.json", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"{{ "id": "{id}", "name": "{name}", "version": "{version}" }}"#
        )
        .unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn version_record(url: &str, filename: &str) -> VersionRecord {
        VersionRecord {
            id: "VER00002".to_string(),
            project_id: "AABBCCDD".to_string(),
            name: "Example 2.0.0".to_string(),
            version_number: "2.0.0".to_string(),
            game_versions: vec!["1.20.1".to_string()],
            loaders: vec!["fabric".to_string()],
            dependencies: vec![],
            date_published: None,
            version_type: VersionType::Release,
            files: vec![VersionFile {
                url: url.to_string(),
                filename: filename.to_string(),
                primary: true,
                size: 0,
                hashes: Default::default(),
            }],
        }
    }

    fn quiet_registry() -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry
            .expect_get_project_info()
            .returning(|id| Err(RegistryError::NotFound(id.to_string())));
        registry.expect_invalidate_project().return_const(());
        registry
    }

    #[tokio::test]
    async fn install_from_latest_version_writes_archive_and_sidecar() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/example-2.0.0.jar")
            .with_status(200)
            .with_body(fabric_jar("example", "Example", "2.0.0"))
            .create_async()
            .await;
        let url = format!("{}/files/example-2.0.0.jar", server.url());

        let mut registry = quiet_registry();
        registry
            .expect_query_versions()
            .withf(|query| query.project_id == "AABBCCDD" && query.latest_only)
            .times(1)
            .returning(move |_| Ok(vec![version_record(&url, "example-2.0.0.jar")]));

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let pipeline = InstallationPipeline::new(Arc::new(registry));

        let installed = pipeline
            .try_install(
                root,
                PackageDetails {
                    project_id: Some("AABBCCDD".to_string()),
                    name: Some("Example".to_string()),
                    ..PackageDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(installed.file_name, "Example-2.0.0.jar");
        assert_eq!(installed.category, Category::ServerOnly);
        assert!(root.join("mods/Example-2.0.0.jar").is_file());
        let sidecar = pipeline
            .store()
            .read_sidecar(root, "Example-2.0.0.jar")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sidecar.project_id.as_deref(), Some("AABBCCDD"));
        assert_eq!(sidecar.version_id.as_deref(), Some("VER00002"));
        assert_eq!(sidecar.source.as_deref(), Some("modrinth"));
    }

    #[tokio::test]
    async fn update_keeps_both_placement_and_removes_previous_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/example-2.0.0.jar")
            .with_status(200)
            .with_body(fabric_jar("example", "Example", "2.0.0"))
            .create_async()
            .await;
        let url = format!("{}/files/example-2.0.0.jar", server.url());

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["mods", "client/mods"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
            std::fs::write(root.join(dir).join("example-1.0.0.jar"), b"old").unwrap();
        }

        let mut registry = quiet_registry();
        registry
            .expect_get_version_detail()
            .withf(|project_id, version_id| {
                project_id.as_deref() == Some("AABBCCDD") && version_id.to_string() == "VER00002"
            })
            .returning(move |_, _| Ok(version_record(&url, "example-2.0.0.jar")));

        let pipeline = InstallationPipeline::new(Arc::new(registry));
        let installed = pipeline
            .try_install(
                root,
                PackageDetails {
                    project_id: Some("AABBCCDD".to_string()),
                    version_id: Some("VER00002".to_string()),
                    file_name: Some("example-2.0.0.jar".to_string()),
                    existing_file_name: Some("example-1.0.0.jar".to_string()),
                    ..PackageDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(installed.file_name, "example-2.0.0.jar");
        assert_eq!(installed.category, Category::Both);
        assert!(root.join("mods/example-2.0.0.jar").is_file());
        assert!(root.join("client/mods/example-2.0.0.jar").is_file());
        assert!(!root.join("mods/example-1.0.0.jar").exists());
        assert!(!root.join("client/mods/example-1.0.0.jar").exists());
        assert!(root.join("client/minecraft-core-manifests/example-2.0.0.jar.json").is_file());
    }

    #[tokio::test]
    async fn fresh_install_replaces_existing_copy_where_it_sits() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/dl/foo.jar")
            .with_status(200)
            .with_body(b"new")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("client/mods")).unwrap();
        std::fs::write(root.join("client/mods/Foo-1.0.0.jar"), b"old").unwrap();

        let pipeline = InstallationPipeline::new(Arc::new(MockRegistry::new()));
        let installed = pipeline
            .try_install(
                root,
                PackageDetails {
                    name: Some("Foo".to_string()),
                    version_number: Some("1.0.0".to_string()),
                    download_url: Some(format!("{}/dl/foo.jar", server.url())),
                    ..PackageDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(installed.file_name, "Foo-1.0.0.jar");
        assert_eq!(installed.category, Category::ClientOnly);
        assert_eq!(
            std::fs::read(root.join("client/mods/Foo-1.0.0.jar")).unwrap(),
            b"new"
        );
        assert!(!root.join("mods/Foo-1.0.0.jar").exists());
    }

    #[tokio::test]
    async fn missing_project_and_url_is_invalid_input() {
        let pipeline = InstallationPipeline::new(Arc::new(MockRegistry::new()));
        let temp_dir = TempDir::new().unwrap();

        let outcome = pipeline
            .install(temp_dir.path(), PackageDetails::default())
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn version_without_files_is_no_download_url() {
        let mut registry = MockRegistry::new();
        registry.expect_query_versions().returning(|_| {
            let mut record = version_record("https://unused", "unused.jar");
            record.files.clear();
            Ok(vec![record])
        });
        let pipeline = InstallationPipeline::new(Arc::new(registry));
        let temp_dir = TempDir::new().unwrap();

        let result = pipeline
            .try_install(
                temp_dir.path(),
                PackageDetails {
                    project_id: Some("AABBCCDD".to_string()),
                    ..PackageDetails::default()
                },
            )
            .await;

        assert!(matches!(result, Err(InstallError::NoDownloadUrl(_))));
    }

    #[tokio::test]
    async fn explicit_url_install_uses_cleaner_name_from_archive() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/dl/abc123")
            .with_status(200)
            .with_body(fabric_jar("zoomify", "Zoomify", "2.11.2"))
            .create_async()
            .await;

        let pipeline = InstallationPipeline::new(Arc::new(MockRegistry::new()));
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let outcome = pipeline
            .install(
                root,
                PackageDetails {
                    download_url: Some(format!("{}/dl/abc123", server.url())),
                    category: Some(Category::ClientOnly),
                    ..PackageDetails::default()
                },
            )
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.file_name.as_deref(), Some("Zoomify-2.11.2.jar"));
        assert!(root.join("client/mods/Zoomify-2.11.2.jar").is_file());
        assert!(!root.join("client/mods/abc123.jar").exists());
    }
}
