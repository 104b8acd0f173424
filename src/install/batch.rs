//! Batch update and disable with per-item isolation

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::install::pipeline::{InstallationPipeline, PackageDetails};
use crate::layout::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub updated_count: usize,
    pub disabled_count: usize,
    pub errors: Vec<BatchItemError>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// `"<n> items failed: id: error; ..."`, or `None` when nothing failed
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let details = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.id, e.error))
            .collect::<Vec<_>>()
            .join("; ");
        Some(format!("{} items failed: {}", self.errors.len(), details))
    }

    fn fail(&mut self, id: String, error: String) {
        error!("Batch item {} failed: {}", id, error);
        self.errors.push(BatchItemError { id, error });
    }
}

impl InstallationPipeline {
    /// Install every item in order; one failure never stops the others
    pub async fn update_all(&self, root: &Path, items: Vec<PackageDetails>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let total = items.len();

        for (index, details) in items.into_iter().enumerate() {
            let id = details
                .identifier()
                .map(str::to_string)
                .unwrap_or_else(|| format!("item #{}", index + 1));

            match self.try_install(root, details).await {
                Ok(installed) => {
                    info!("Updated {} -> {}", id, installed.file_name);
                    outcome.updated_count += 1;
                }
                Err(e) => outcome.fail(id, e.to_string()),
            }
        }

        info!(
            "Batch update finished: {}/{} updated",
            outcome.updated_count, total
        );
        outcome
    }

    /// Move every named file into the disabled slots of its sides
    pub async fn disable_all(&self, root: &Path, file_names: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for file_name in file_names {
            let result = self
                .reconciler()
                .reconcile(root, file_name, Category::Disabled)
                .await
                .and_then(|report| report.into_result());
            match result {
                Ok(_) => outcome.disabled_count += 1,
                Err(e) => outcome.fail(file_name.clone(), e.to_string()),
            }
        }

        outcome
    }
}
