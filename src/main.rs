use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use modsync::archive::LoaderKind;
use modsync::compat::CompatibilityReportBuilder;
use modsync::config::{EngineConfig, config_path, log_path};
use modsync::install::{Downloader, InstallationPipeline, PackageDetails, TracingReporter};
use modsync::layout::Category;
use modsync::logging::init_logging;
use modsync::manifest::ManifestStore;
use modsync::reconcile::LocationReconciler;
use modsync::registry::{Registry, RegistryClient, SearchQuery};

#[derive(Parser)]
#[command(name = "modsync")]
#[command(version, about = "Mod version resolution and file-state synchronization")]
struct Cli {
    /// Installation root holding `mods/` and `client/mods/`
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (defaults to <data dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write log lines as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed packages
    List,
    /// Report compatibility of installed packages with a runtime version
    Check {
        #[arg(long)]
        runtime: String,
        #[arg(long)]
        loader: Option<LoaderKind>,
        /// Report disabled packages instead of enabled ones
        #[arg(long)]
        disabled: bool,
    },
    /// Move one package into the locations of a category
    Reconcile { file: String, category: Category },
    /// Disable exactly the given files, enabling every other archive
    SyncDisabled { files: Vec<String> },
    /// Install a project from the registry
    Install {
        project: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        loader: Option<LoaderKind>,
        #[arg(long)]
        runtime: Option<String>,
    },
    /// Update every package with a suggested upgrade for a runtime version
    Update {
        #[arg(long)]
        runtime: String,
        #[arg(long)]
        loader: Option<LoaderKind>,
    },
    /// Search the registry
    Search {
        query: String,
        #[arg(long)]
        loader: Option<LoaderKind>,
        #[arg(long)]
        runtime: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(&log_path(), cli.json).context("Failed to initialize logging")?;
    let config_file = cli.config.clone().unwrap_or_else(config_path);
    let config = EngineConfig::load(&config_file)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli, config))
}

async fn run(cli: Cli, config: EngineConfig) -> anyhow::Result<()> {
    let root = cli.root;
    let store = ManifestStore::new();
    let registry: Arc<dyn Registry> = Arc::new(RegistryClient::with_config(&config.registry));
    let pipeline = || {
        InstallationPipeline::new(Arc::clone(&registry))
            .with_archive_cache(Arc::clone(store.archive_cache()))
            .with_downloader(Downloader::new(&config.registry))
            .with_reporter(Arc::new(TracingReporter))
    };

    match cli.command {
        Command::List => print_json(&store.read_installed(&root).await?),
        Command::Check {
            runtime,
            loader,
            disabled,
        } => {
            let builder = CompatibilityReportBuilder::new(Arc::clone(&registry), store.clone())
                .with_loader(loader);
            let report = if disabled {
                builder.build_disabled_report(&root, &runtime).await?
            } else {
                builder.build_report(&root, &runtime).await?
            };
            print_json(&report)
        }
        Command::Reconcile { file, category } => {
            let reconciler = LocationReconciler::with_cache(Arc::clone(store.archive_cache()));
            let report = reconciler.reconcile(&root, &file, category).await?;
            print_json(&report)?;
            report.into_result()?;
            Ok(())
        }
        Command::SyncDisabled { files } => {
            let reconciler = LocationReconciler::with_cache(Arc::clone(store.archive_cache()));
            let desired: BTreeSet<String> = files.into_iter().collect();
            print_json(&reconciler.reconcile_directory(&root, &desired).await?)
        }
        Command::Install {
            project,
            version,
            category,
            loader,
            runtime,
        } => {
            let details = PackageDetails {
                project_id: Some(project),
                version_id: version,
                category,
                loader,
                game_version: runtime,
                ..PackageDetails::default()
            };
            let outcome = pipeline().install(&root, details).await;
            print_json(&outcome)?;
            match outcome.error {
                Some(error) => anyhow::bail!(error),
                None => Ok(()),
            }
        }
        Command::Update { runtime, loader } => {
            let report = CompatibilityReportBuilder::new(Arc::clone(&registry), store.clone())
                .with_loader(loader)
                .build_report(&root, &runtime)
                .await?;
            let items: Vec<PackageDetails> = report
                .upgrades()
                .map(|(entry, upgrade)| PackageDetails::for_upgrade(&entry.file_name, upgrade))
                .collect();
            info!("Updating {} packages for {}", items.len(), runtime);

            let outcome = pipeline().update_all(&root, items).await;
            print_json(&outcome)?;
            match outcome.error_summary() {
                Some(summary) => anyhow::bail!(summary),
                None => Ok(()),
            }
        }
        Command::Search {
            query,
            loader,
            runtime,
            limit,
        } => {
            let query = SearchQuery {
                loader,
                game_version: runtime,
                limit,
                ..SearchQuery::new(&query)
            };
            print_json(&registry.search_projects(&query).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
