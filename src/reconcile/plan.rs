//! Reconciliation plans
//!
//! A plan is computed from the probed state before anything on disk is
//! touched. Archive copies run first, then archive moves, then sidecar
//! transfers, then deletes. A source is never removed before every step
//! reading it has run, and a sidecar only moves once its archive has.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::layout::{Category, InstallationLayout, Side, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Copy,
    Move,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSubject {
    Archive,
    Sidecar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub action: PlanAction,
    pub subject: StepSubject,
    /// Side written to, or the side removed from for deletes
    pub side: Side,
    pub src: PathBuf,
    /// Absent for deletes
    pub dst: Option<PathBuf>,
}

impl PlanStep {
    fn copy(subject: StepSubject, side: Side, src: PathBuf, dst: PathBuf) -> Self {
        Self {
            action: PlanAction::Copy,
            subject,
            side,
            src,
            dst: Some(dst),
        }
    }

    fn rename(subject: StepSubject, side: Side, src: PathBuf, dst: PathBuf) -> Self {
        Self {
            action: PlanAction::Move,
            subject,
            side,
            src,
            dst: Some(dst),
        }
    }

    fn delete(subject: StepSubject, side: Side, path: PathBuf) -> Self {
        Self {
            action: PlanAction::Delete,
            subject,
            side,
            src: path,
            dst: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub file_name: String,
    pub category: Category,
    pub steps: Vec<PlanStep>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Slots the archive must occupy once `category` is reached
pub fn target_slots(occupied: &BTreeSet<Slot>, category: Category) -> BTreeSet<Slot> {
    match category {
        Category::ServerOnly => BTreeSet::from([Slot::ServerEnabled]),
        Category::ClientOnly => BTreeSet::from([Slot::ClientEnabled]),
        Category::Both => BTreeSet::from([Slot::ServerEnabled, Slot::ClientEnabled]),
        // In place on every side currently holding a copy
        Category::Disabled => occupied
            .iter()
            .map(|slot| Slot::disabled(slot.side()))
            .collect(),
    }
}

/// Candidate sources for filling `target`, most preferred first
fn source_preference(target: Slot) -> [Slot; 5] {
    let side = target.side();
    [
        Slot::enabled(side),
        Slot::disabled(side),
        Slot::enabled(side.other()),
        Slot::disabled(side.other()),
        Slot::LegacyDisabled,
    ]
}

fn sides_of(slots: &BTreeSet<Slot>) -> BTreeSet<Side> {
    slots.iter().map(|slot| slot.side()).collect()
}

/// Compute the steps that bring `file_name` from `occupied` to `category`.
///
/// `sidecars` lists the sides that currently hold a sidecar. An already
/// reconciled state yields an empty plan.
pub fn build_plan(
    layout: &InstallationLayout,
    file_name: &str,
    occupied: &BTreeSet<Slot>,
    sidecars: &BTreeSet<Side>,
    category: Category,
) -> ReconcilePlan {
    let target = target_slots(occupied, category);

    let mut sources: BTreeMap<Slot, Slot> = BTreeMap::new();
    for &slot in target.difference(occupied) {
        if let Some(source) = source_preference(slot)
            .into_iter()
            .find(|candidate| *candidate != slot && occupied.contains(candidate))
        {
            sources.insert(slot, source);
        }
    }

    let mut removals: BTreeSet<Slot> = occupied.difference(&target).copied().collect();

    let mut copies = Vec::new();
    let mut moves = Vec::new();
    for (&slot, &source) in &sources {
        let uses = sources.values().filter(|s| **s == source).count();
        let src = layout.archive_path(source, file_name);
        let dst = layout.archive_path(slot, file_name);
        if uses == 1 && removals.remove(&source) {
            moves.push(PlanStep::rename(StepSubject::Archive, slot.side(), src, dst));
        } else {
            copies.push(PlanStep::copy(StepSubject::Archive, slot.side(), src, dst));
        }
    }

    let mut deletes: Vec<PlanStep> = removals
        .iter()
        .map(|slot| {
            PlanStep::delete(
                StepSubject::Archive,
                slot.side(),
                layout.archive_path(*slot, file_name),
            )
        })
        .collect();

    // Sidecars follow the archive across the server/client boundary
    let mut sidecar_transfers = Vec::new();
    let sides_after = sides_of(&target);
    for side in [Side::Server, Side::Client] {
        let other = side.other();
        let path = layout.sidecar_path(side, file_name);
        let other_path = layout.sidecar_path(other, file_name);

        if sides_after.contains(&side) {
            if !sidecars.contains(&side) && sidecars.contains(&other) {
                let step = if sides_after.contains(&other) {
                    PlanStep::copy(StepSubject::Sidecar, side, other_path, path)
                } else {
                    PlanStep::rename(StepSubject::Sidecar, side, other_path, path)
                };
                sidecar_transfers.push(step);
            }
        } else if sidecars.contains(&side) && sidecars.contains(&other) {
            deletes.push(PlanStep::delete(StepSubject::Sidecar, side, path));
        }
    }

    let mut steps = copies;
    steps.extend(moves);
    steps.extend(sidecar_transfers);
    steps.extend(deletes);

    ReconcilePlan {
        file_name: file_name.to_string(),
        category,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layout() -> InstallationLayout {
        InstallationLayout::new("/srv")
    }

    fn slots(items: &[Slot]) -> BTreeSet<Slot> {
        items.iter().copied().collect()
    }

    fn render(plan: &ReconcilePlan) -> Vec<String> {
        plan.steps
            .iter()
            .map(|step| {
                let src = step.src.strip_prefix("/srv").unwrap().display().to_string();
                match &step.dst {
                    Some(dst) => format!(
                        "{:?} {} -> {}",
                        step.action,
                        src,
                        dst.strip_prefix("/srv").unwrap().display()
                    ),
                    None => format!("{:?} {}", step.action, src),
                }
            })
            .collect()
    }

    #[test]
    fn enable_disabled_server_copy_is_a_rename() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerDisabled]),
            &BTreeSet::from([Side::Server]),
            Category::ServerOnly,
        );

        assert_eq!(render(&plan), vec!["Move mods/a.jar.disabled -> mods/a.jar"]);
    }

    #[test]
    fn server_to_client_moves_archive_and_sidecar() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerEnabled]),
            &BTreeSet::from([Side::Server]),
            Category::ClientOnly,
        );

        assert_eq!(
            render(&plan),
            vec![
                "Move mods/a.jar -> client/mods/a.jar",
                "Move minecraft-core-manifests/a.jar.json -> client/minecraft-core-manifests/a.jar.json",
            ]
        );
    }

    #[test]
    fn both_from_disabled_copies_twice_then_deletes_original() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerDisabled]),
            &BTreeSet::from([Side::Server]),
            Category::Both,
        );

        assert_eq!(
            render(&plan),
            vec![
                "Copy mods/a.jar.disabled -> mods/a.jar",
                "Copy mods/a.jar.disabled -> client/mods/a.jar",
                "Copy minecraft-core-manifests/a.jar.json -> client/minecraft-core-manifests/a.jar.json",
                "Delete mods/a.jar.disabled",
            ]
        );
    }

    #[test]
    fn sidecar_copy_runs_after_archive_move_to_its_side() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerEnabled, Slot::ClientDisabled]),
            &BTreeSet::from([Side::Server]),
            Category::Both,
        );

        assert_eq!(
            render(&plan),
            vec![
                "Move client/mods/a.jar.disabled -> client/mods/a.jar",
                "Copy minecraft-core-manifests/a.jar.json -> client/minecraft-core-manifests/a.jar.json",
            ]
        );
        assert_eq!(plan.steps[1].subject, StepSubject::Sidecar);
        assert_eq!(plan.steps[1].side, Side::Client);
    }

    #[test]
    fn disable_renames_in_place_on_each_side() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerEnabled, Slot::ClientEnabled]),
            &BTreeSet::from([Side::Server, Side::Client]),
            Category::Disabled,
        );

        assert_eq!(
            render(&plan),
            vec![
                "Move mods/a.jar -> mods/a.jar.disabled",
                "Move client/mods/a.jar -> client/mods/a.jar.disabled",
            ]
        );
    }

    #[test]
    fn both_to_server_only_drops_client_copy_and_sidecar() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerEnabled, Slot::ClientEnabled]),
            &BTreeSet::from([Side::Server, Side::Client]),
            Category::ServerOnly,
        );

        assert_eq!(
            render(&plan),
            vec![
                "Delete client/mods/a.jar",
                "Delete client/minecraft-core-manifests/a.jar.json",
            ]
        );
    }

    #[test]
    fn legacy_copy_is_migrated_and_removed() {
        let plan = build_plan(
            &layout(),
            "a.jar",
            &slots(&[Slot::ServerEnabled, Slot::LegacyDisabled]),
            &BTreeSet::new(),
            Category::Disabled,
        );

        assert_eq!(
            render(&plan),
            vec!["Move mods/a.jar -> mods/a.jar.disabled", "Delete mods_disabled/a.jar"]
        );
    }

    #[rstest]
    #[case(&[Slot::ServerEnabled], Category::ServerOnly)]
    #[case(&[Slot::ClientEnabled], Category::ClientOnly)]
    #[case(&[Slot::ServerEnabled, Slot::ClientEnabled], Category::Both)]
    #[case(&[Slot::ServerDisabled, Slot::ClientDisabled], Category::Disabled)]
    #[case(&[Slot::ClientDisabled], Category::Disabled)]
    fn reconciled_state_has_empty_plan(#[case] occupied: &[Slot], #[case] category: Category) {
        let occupied = slots(occupied);
        let plan = build_plan(&layout(), "a.jar", &occupied, &sides_of(&occupied), category);

        assert!(plan.is_empty(), "unexpected steps: {:?}", render(&plan));
    }

    #[test]
    fn steps_are_ordered_copies_moves_deletes() {
        for mask in 1u8..32 {
            let occupied: BTreeSet<Slot> = Slot::PROBE_ORDER
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, slot)| *slot)
                .collect();
            for category in [
                Category::ServerOnly,
                Category::ClientOnly,
                Category::Both,
                Category::Disabled,
            ] {
                let plan = build_plan(&layout(), "a.jar", &occupied, &BTreeSet::new(), category);
                let actions: Vec<PlanAction> = plan.steps.iter().map(|s| s.action).collect();
                let mut sorted = actions.clone();
                sorted.sort();
                assert_eq!(actions, sorted, "{:?} -> {:?}", occupied, category);
            }
        }
    }
}
