mod helper;

use std::sync::Arc;

use mockito::{Matcher, Server};
use tempfile::TempDir;

use helper::{MockRegistry, fabric_jar, version, write_file, write_sidecar};
use modsync::compat::{CompatibilityReportBuilder, CompatibilityStatus};
use modsync::install::{InstallationPipeline, PackageDetails};
use modsync::layout::Category;
use modsync::manifest::ManifestStore;

#[tokio::test]
async fn batch_update_isolates_item_without_download_url() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", Matcher::Regex(r"^/dl/\w+\.jar$".to_string()))
        .with_status(200)
        .with_body(b"jar")
        .create_async()
        .await;

    let ids = ["AAAA0001", "AAAA0002", "AAAA0003", "AAAA0004", "AAAA0005"];
    let items: Vec<PackageDetails> = ids
        .iter()
        .map(|id| PackageDetails {
            project_id: Some(id.to_string()),
            name: Some(format!("Mod {id}")),
            version_number: Some("2.0.0".to_string()),
            download_url: (*id != "AAAA0003").then(|| format!("{}/dl/{id}.jar", server.url())),
            ..PackageDetails::default()
        })
        .collect();

    // No versions are registered for the third project
    let registry = Arc::new(MockRegistry::new().with_versions("AAAA0003", vec![]));
    let temp_dir = TempDir::new().unwrap();
    let pipeline = InstallationPipeline::new(registry.clone());

    let outcome = pipeline.update_all(temp_dir.path(), items).await;

    assert_eq!(outcome.updated_count, 4);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].id, "AAAA0003");
    assert!(
        outcome
            .error_summary()
            .unwrap()
            .starts_with("1 items failed: AAAA0003")
    );
    assert_eq!(registry.invalidated().len(), 4);
}

#[tokio::test]
async fn update_from_report_replaces_outdated_archive_in_place() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/dl/lithium-0.12.0.jar")
        .with_status(200)
        .with_body(fabric_jar("lithium", "0.12.0", Some(">=1.20 <1.21")))
        .create_async()
        .await;
    let url = format!("{}/dl/lithium-0.12.0.jar", server.url());

    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let old = fabric_jar("lithium", "0.11.0", Some(">=1.20 <1.21"));
    write_file(root, "mods/lithium-0.11.0.jar", &old);
    write_file(root, "client/mods/lithium-0.11.0.jar", &old);
    write_sidecar(
        root,
        "lithium-0.11.0.jar",
        r#"{ "projectId": "gvQqBUqZ", "versionId": "LITH0011", "versionNumber": "0.11.0" }"#,
    );

    let registry = Arc::new(MockRegistry::new().with_versions(
        "gvQqBUqZ",
        vec![
            version("gvQqBUqZ", "LITH0011", "0.11.0", &["1.20.1"], 1, "unused"),
            version("gvQqBUqZ", "LITH0012", "0.12.0", &["1.20.1"], 5, &url),
        ],
    ));
    let store = ManifestStore::new();

    let report = CompatibilityReportBuilder::new(registry.clone(), store.clone())
        .build_report(root, "1.20.1")
        .await
        .unwrap();
    let entry = report.get("lithium-0.11.0.jar").unwrap();
    assert_eq!(entry.status, CompatibilityStatus::NeedsUpdate);

    let items: Vec<PackageDetails> = report
        .upgrades()
        .map(|(entry, upgrade)| PackageDetails::for_upgrade(&entry.file_name, upgrade))
        .collect();
    let pipeline = InstallationPipeline::new(registry.clone())
        .with_archive_cache(store.archive_cache().clone());
    let outcome = pipeline.update_all(root, items).await;

    assert!(outcome.is_success(), "{:?}", outcome.errors);
    assert_eq!(outcome.updated_count, 1);
    assert!(root.join("mods/gvqqbuqz-0.12.0.jar").is_file());
    assert!(root.join("client/mods/gvqqbuqz-0.12.0.jar").is_file());
    assert!(!root.join("mods/lithium-0.11.0.jar").exists());
    assert!(!root.join("minecraft-core-manifests/lithium-0.11.0.jar.json").exists());

    let record = store
        .read_record(root, "gvqqbuqz-0.12.0.jar")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.category(), Some(Category::Both));
    assert_eq!(record.project_id.as_deref(), Some("gvQqBUqZ"));
    assert_eq!(record.version_id.as_deref(), Some("LITH0012"));
    assert_eq!(record.version_number.as_deref(), Some("0.12.0"));
    assert_eq!(registry.invalidated(), vec!["gvQqBUqZ".to_string()]);
}

#[tokio::test]
async fn install_resolves_latest_version_for_runtime() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/dl/new.jar")
        .with_status(200)
        .with_body(fabric_jar("zoomify", "2.0.0", None))
        .create_async()
        .await;
    let url = format!("{}/dl/new.jar", server.url());

    let registry = Arc::new(MockRegistry::new().with_versions(
        "ZOOMIFY1",
        vec![
            version("ZOOMIFY1", "Z1", "1.0.0", &["1.19.4"], 1, "unused"),
            version("ZOOMIFY1", "Z2", "2.0.0", &["1.20.1"], 2, &url),
        ],
    ));
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let outcome = InstallationPipeline::new(registry)
        .install(
            root,
            PackageDetails {
                project_id: Some("ZOOMIFY1".to_string()),
                name: Some("Zoomify".to_string()),
                game_version: Some("1.20.1".to_string()),
                category: Some(Category::ClientOnly),
                ..PackageDetails::default()
            },
        )
        .await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.file_name.as_deref(), Some("Zoomify-2.0.0.jar"));
    assert_eq!(outcome.version_number.as_deref(), Some("2.0.0"));
    assert!(root.join("client/mods/Zoomify-2.0.0.jar").is_file());
    assert!(root.join("client/minecraft-core-manifests/Zoomify-2.0.0.jar.json").is_file());
    assert!(!root.join("mods/Zoomify-2.0.0.jar").exists());
}
