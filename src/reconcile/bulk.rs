//! Directory-wide enable/disable synchronization

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::layout::{InstallationLayout, Side, Slot, is_file, list_archives};
use crate::reconcile::error::ReconcileError;
use crate::reconcile::reconciler::{LocationReconciler, move_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Number of archives renamed, migrated or removed
    pub changed: usize,
    pub errors: Vec<FileError>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, file_name: &str, result: Result<bool, ReconcileError>) {
        match result {
            Ok(true) => self.changed += 1,
            Ok(false) => {}
            Err(e) => {
                error!("Failed to synchronize {}: {}", file_name, e);
                self.errors.push(FileError {
                    file_name: file_name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

impl LocationReconciler {
    /// Flip the `.disabled` suffix of every archive so exactly the names in
    /// `desired_disabled` are disabled.
    ///
    /// Server and client directories are handled independently. Legacy
    /// `mods_disabled` entries are migrated into the server directory.
    /// Failures are collected per file; processing always continues.
    pub async fn reconcile_directory(
        &self,
        root: &Path,
        desired_disabled: &BTreeSet<String>,
    ) -> Result<BulkOutcome, ReconcileError> {
        let layout = InstallationLayout::new(root);
        let mut outcome = BulkOutcome::default();

        for side in [Side::Server, Side::Client] {
            let dir = layout.mods_dir(side);
            for (name, disabled) in list_archives(&dir)
                .await
                .map_err(|e| ReconcileError::io(&dir, e))?
            {
                let want_disabled = desired_disabled.contains(&name);
                if disabled == want_disabled {
                    continue;
                }
                let (from, to) = if want_disabled {
                    (Slot::enabled(side), Slot::disabled(side))
                } else {
                    (Slot::disabled(side), Slot::enabled(side))
                };
                let result = self.relocate(&layout, &name, from, to).await;
                outcome.record(&name, result);
            }
        }

        let legacy_dir = layout.legacy_disabled_dir();
        for (name, _) in list_archives(&legacy_dir)
            .await
            .map_err(|e| ReconcileError::io(&legacy_dir, e))?
        {
            let to = if desired_disabled.contains(&name) {
                Slot::ServerDisabled
            } else {
                Slot::ServerEnabled
            };
            let result = self.relocate(&layout, &name, Slot::LegacyDisabled, to).await;
            outcome.record(&name, result);
        }

        info!(
            "Synchronized disabled state under {:?}: {} changed, {} failed",
            root,
            outcome.changed,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Move one archive between slots; when the destination already holds a
    /// copy the source is dropped instead
    async fn relocate(
        &self,
        layout: &InstallationLayout,
        file_name: &str,
        from: Slot,
        to: Slot,
    ) -> Result<bool, ReconcileError> {
        let src = layout.archive_path(from, file_name);
        let dst = layout.archive_path(to, file_name);

        if !is_file(&src).await {
            return Ok(false);
        }

        if is_file(&dst).await {
            tokio::fs::remove_file(&src)
                .await
                .map_err(|e| ReconcileError::io(&src, e))?;
        } else {
            move_file(&src, &dst).await?;
        }

        self.archive_cache().invalidate(&src);
        self.archive_cache().invalidate(&dst);
        Ok(true)
    }
}
