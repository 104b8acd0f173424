//! Plan execution against the filesystem

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::ArchiveMetadataCache;
use crate::layout::{Category, InstallationLayout, Location, Side, is_file};
use crate::manifest::validate_file_name;
use crate::reconcile::error::ReconcileError;
use crate::reconcile::plan::{PlanAction, PlanStep, ReconcilePlan, StepSubject, build_plan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum StepStatus {
    Done,
    Failed(String),
    /// Not attempted because an earlier copy or move failed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    #[serde(flatten)]
    pub step: PlanStep,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub file_name: String,
    pub category: Category,
    pub steps: Vec<StepOutcome>,
    /// Locations probed after execution
    pub locations: BTreeSet<Location>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.steps
            .iter()
            .all(|outcome| outcome.status == StepStatus::Done)
    }

    pub fn failures(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|outcome| match &outcome.status {
                StepStatus::Failed(error) => Some(format!("{:?}: {}", outcome.step.src, error)),
                _ => None,
            })
            .collect()
    }

    /// Turn step failures into an error
    pub fn into_result(self) -> Result<Self, ReconcileError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(ReconcileError::Incomplete {
            file_name: self.file_name.clone(),
            failures: self.failures().join("; "),
        })
    }
}

/// Moves, copies and deletes archives and sidecars so each package sits in
/// the locations implied by its category
#[derive(Debug, Default, Clone)]
pub struct LocationReconciler {
    archive_cache: Arc<ArchiveMetadataCache>,
}

impl LocationReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share the archive cache so paths written here are invalidated
    pub fn with_cache(archive_cache: Arc<ArchiveMetadataCache>) -> Self {
        Self { archive_cache }
    }

    pub fn archive_cache(&self) -> &Arc<ArchiveMetadataCache> {
        &self.archive_cache
    }

    /// Locations currently holding `file_name`
    pub async fn probe_locations(&self, root: &Path, file_name: &str) -> BTreeSet<Location> {
        InstallationLayout::new(root)
            .occupied_slots(file_name)
            .await
            .into_iter()
            .map(|slot| slot.location())
            .collect()
    }

    /// Category inferred from the copies on disk
    pub async fn current_category(&self, root: &Path, file_name: &str) -> Option<Category> {
        let locations = self.probe_locations(root, file_name).await;
        Category::from_enabled(
            locations.contains(&Location::Server),
            locations.contains(&Location::Client),
        )
        .or_else(|| locations.contains(&Location::Disabled).then_some(Category::Disabled))
    }

    /// Compute the plan without touching the disk
    pub async fn plan(
        &self,
        root: &Path,
        file_name: &str,
        category: Category,
    ) -> Result<ReconcilePlan, ReconcileError> {
        validate_file_name(file_name)
            .map_err(|_| ReconcileError::InvalidFileName(file_name.to_string()))?;

        let layout = InstallationLayout::new(root);
        let occupied = layout.occupied_slots(file_name).await;
        if occupied.is_empty() {
            return Err(ReconcileError::NotInstalled(file_name.to_string()));
        }

        let mut sidecars = BTreeSet::new();
        for side in [Side::Server, Side::Client] {
            if is_file(&layout.sidecar_path(side, file_name)).await {
                sidecars.insert(side);
            }
        }

        Ok(build_plan(&layout, file_name, &occupied, &sidecars, category))
    }

    /// Bring `file_name` into `category`.
    ///
    /// Step failures are captured in the report. When any copy or move
    /// fails, deletes are skipped so at least one copy always remains. A
    /// sidecar is not transferred to a side whose archive transfer failed.
    pub async fn reconcile(
        &self,
        root: &Path,
        file_name: &str,
        category: Category,
    ) -> Result<ReconcileReport, ReconcileError> {
        let plan = self.plan(root, file_name, category).await?;

        if plan.is_empty() {
            debug!("{} already in {}", file_name, category);
        } else {
            info!(
                "Reconciling {} to {} ({} steps)",
                file_name,
                category,
                plan.steps.len()
            );
        }

        let steps = self.execute(plan.steps).await;
        let locations = self.probe_locations(root, file_name).await;

        Ok(ReconcileReport {
            file_name: file_name.to_string(),
            category,
            steps,
            locations,
        })
    }

    async fn execute(&self, steps: Vec<PlanStep>) -> Vec<StepOutcome> {
        let mut transfer_failed = false;
        let mut failed_sides = BTreeSet::new();
        let mut outcomes = Vec::with_capacity(steps.len());

        for step in steps {
            let skip = match step.action {
                PlanAction::Delete => transfer_failed,
                _ => step.subject == StepSubject::Sidecar && failed_sides.contains(&step.side),
            };
            if skip {
                warn!("Skipping {:?} of {:?} after failed transfer", step.action, step.src);
                outcomes.push(StepOutcome {
                    step,
                    status: StepStatus::Skipped,
                });
                continue;
            }

            let status = match run_step(&step).await {
                Ok(()) => StepStatus::Done,
                Err(e) => {
                    warn!("{:?} {:?} failed: {}", step.action, step.src, e);
                    if step.action != PlanAction::Delete {
                        transfer_failed = true;
                        if step.subject == StepSubject::Archive {
                            failed_sides.insert(step.side);
                        }
                    }
                    StepStatus::Failed(e.to_string())
                }
            };

            self.archive_cache.invalidate(&step.src);
            if let Some(dst) = &step.dst {
                self.archive_cache.invalidate(dst);
            }

            outcomes.push(StepOutcome { step, status });
        }

        outcomes
    }
}

async fn run_step(step: &PlanStep) -> Result<(), ReconcileError> {
    match (step.action, &step.dst) {
        (PlanAction::Copy, Some(dst)) => copy_file(&step.src, dst).await,
        (PlanAction::Move, Some(dst)) => move_file(&step.src, dst).await,
        (PlanAction::Delete, _) => tokio::fs::remove_file(&step.src)
            .await
            .map_err(|e| ReconcileError::io(&step.src, e)),
        (_, None) => Err(ReconcileError::io(
            &step.src,
            std::io::Error::new(ErrorKind::InvalidInput, "missing destination"),
        )),
    }
}

async fn ensure_parent(path: &Path) -> Result<(), ReconcileError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ReconcileError::io(parent, e))?;
    }
    Ok(())
}

pub(crate) async fn copy_file(src: &Path, dst: &Path) -> Result<(), ReconcileError> {
    ensure_parent(dst).await?;
    tokio::fs::copy(src, dst)
        .await
        .map_err(|e| ReconcileError::io(src, e))?;
    Ok(())
}

/// Rename, falling back to copy and delete across filesystems
pub(crate) async fn move_file(src: &Path, dst: &Path) -> Result<(), ReconcileError> {
    ensure_parent(dst).await?;
    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!("Cross-device move of {:?}, copying instead", src);
            copy_file(src, dst).await?;
            tokio::fs::remove_file(src)
                .await
                .map_err(|e| ReconcileError::io(src, e))
        }
        Err(e) => Err(ReconcileError::io(src, e)),
    }
}
