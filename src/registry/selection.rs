//! Version filtering and latest-version ranking

use std::cmp::Ordering;

use crate::archive::LoaderKind;
use crate::registry::types::VersionRecord;

/// Keep versions whose `loaders` / `game_versions` contain the requested values.
///
/// Membership is exact; constraint ranges are not evaluated here.
pub fn filter_versions(
    versions: Vec<VersionRecord>,
    loader: Option<LoaderKind>,
    game_version: Option<&str>,
) -> Vec<VersionRecord> {
    versions
        .into_iter()
        .filter(|v| loader.is_none_or(|l| v.supports_loader(l)))
        .filter(|v| game_version.is_none_or(|g| v.supports_game_version(g)))
        .collect()
}

/// Pick the single best version from an already filtered list
pub fn select_latest<'a>(
    versions: &'a [VersionRecord],
    game_version: Option<&str>,
) -> Option<&'a VersionRecord> {
    match game_version {
        Some(target) => versions.iter().min_by(|a, b| rank(a, b, target)),
        None => {
            let mut by_date: Vec<&VersionRecord> = versions.iter().collect();
            by_date.sort_by(|a, b| b.date_published.cmp(&a.date_published));
            by_date
                .iter()
                .find(|v| v.is_stable())
                .or_else(|| by_date.first())
                .copied()
        }
    }
}

/// Ordering where the preferred version sorts first
fn rank(a: &VersionRecord, b: &VersionRecord, target: &str) -> Ordering {
    b.is_stable()
        .cmp(&a.is_stable())
        .then_with(|| b.date_published.cmp(&a.date_published))
        .then_with(|| a.game_versions.len().cmp(&b.game_versions.len()))
        .then_with(|| target_position(a, target).cmp(&target_position(b, target)))
}

fn target_position(version: &VersionRecord, target: &str) -> usize {
    version
        .game_versions
        .iter()
        .position(|g| g == target)
        .unwrap_or(usize::MAX)
}

/// Apply the `latest_only` policy on top of a filtered list
pub fn apply_latest_only(
    versions: Vec<VersionRecord>,
    game_version: Option<&str>,
    latest_only: bool,
) -> Vec<VersionRecord> {
    if !latest_only {
        return versions;
    }
    select_latest(&versions, game_version)
        .cloned()
        .into_iter()
        .collect()
}
