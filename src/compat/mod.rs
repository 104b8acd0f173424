//! Runtime compatibility: constraint matching and installed package reports

pub mod matcher;
pub mod report;

pub use matcher::{VersionConstraint, matches};
pub use report::{CompatibilityReport, CompatibilityReportBuilder, CompatibilityStatus, ReportEntry};
