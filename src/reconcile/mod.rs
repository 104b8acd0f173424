//! Placement of archives and sidecars across server, client and disabled slots

pub mod bulk;
pub mod error;
pub mod plan;
pub mod reconciler;

pub use bulk::{BulkOutcome, FileError};
pub use error::ReconcileError;
pub use plan::{PlanAction, PlanStep, ReconcilePlan, StepSubject, build_plan, target_slots};
pub use reconciler::{LocationReconciler, ReconcileReport, StepOutcome, StepStatus};
