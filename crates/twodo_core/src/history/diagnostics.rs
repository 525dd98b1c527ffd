//! Whole-store validation and history/state desync detection.
//!
//! # Responsibility
//! - Walk every document, group and item and report structural breakage.
//! - Replay undo/redo stacks on scratch copies to find entries that no
//!   longer resolve against the live store.
//!
//! # Invariants
//! - Diagnostics never mutate the live store or the history.
//! - Findings are advisory; nothing here blocks further edits.

use crate::hierarchy::end_of_run;
use crate::history::snapshot::Snapshot;
use crate::history::undo::{apply_forward, apply_inverse, History, HistoryEntry};
use crate::model::document::{Group, Store};
use crate::model::item::{Item, ItemId};
use crate::operation::manager::OperationManager;
use crate::operation::types::{Operation, OperationParams};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of [`validate_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Item-level difference between a snapshot and a later store, from
/// [`diff_against_snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub change_index: u64,
    /// Present now, absent from the snapshot.
    pub added: Vec<ItemId>,
    /// In the snapshot, gone now.
    pub removed: Vec<ItemId>,
    /// Present in both, with different content or flat position.
    pub modified: Vec<ItemId>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Category of a history entry that no longer replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoIssueKind {
    /// The entry's own item is gone.
    MissingTarget,
    /// An item the entry would create already exists.
    UnexpectedTarget,
    /// The parent or sibling the entry refers to is gone.
    MissingParent,
    /// Ids resolve, but the replay is still refused.
    ReplayRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoIssue {
    pub kind: UndoIssueKind,
    pub stack: StackName,
    /// Position on its stack, 0 = oldest.
    pub entry_index: usize,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackName {
    Undo,
    Redo,
}

/// Result of [`diagnose_undo_issue`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoDiagnosis {
    pub valid: bool,
    pub issues: Vec<UndoIssue>,
}

/// Checks every structural invariant across the whole store.
///
/// Errors break the parent/child contract, nesting limit, acyclicity or id
/// uniqueness. Warnings flag storage-order oddities and empty groups.
pub fn validate_state(store: &Store, max_depth: usize) -> StateReport {
    let mut report = StateReport::default();
    let mut seen_ids: HashMap<&ItemId, (&str, &str)> = HashMap::new();

    for document in &store.documents {
        for group in &document.groups {
            let scope = format!("{}/{}", document.id, group.id);
            if group.items.is_empty() {
                report.warnings.push(format!("group {scope} has no items"));
            }
            for item in &group.items {
                if let Some((other_document, other_group)) =
                    seen_ids.insert(&item.id, (document.id.as_str(), group.id.as_str()))
                {
                    report.errors.push(format!(
                        "duplicate id {} in {scope} (also in {other_document}/{other_group})",
                        item.id
                    ));
                }
            }
            check_group(group, &scope, max_depth, &mut report);
        }
    }

    report.valid = report.errors.is_empty();
    if report.valid {
        debug!(
            "event=validate_state module=history status=ok warnings={}",
            report.warnings.len()
        );
    } else {
        warn!(
            "event=validate_state module=history status=invalid errors={} warnings={}",
            report.errors.len(),
            report.warnings.len()
        );
    }
    report
}

fn check_group(group: &Group, scope: &str, max_depth: usize, report: &mut StateReport) {
    let items = &group.items;
    let positions: HashMap<&ItemId, usize> = items
        .iter()
        .enumerate()
        .map(|(position, item)| (&item.id, position))
        .collect();
    let depths = chain_depths(items, &positions);
    let mut run_ends: HashMap<usize, usize> = HashMap::new();

    for (position, item) in items.iter().enumerate() {
        let id = &item.id;
        if let Err(err) = item.validate() {
            report.errors.push(format!("item {id} in {scope}: {err}"));
        }

        let mut listed = HashSet::new();
        for child_id in &item.child_ids {
            if !listed.insert(child_id) {
                report
                    .errors
                    .push(format!("item {id} lists child {child_id} more than once"));
            }
            match positions.get(child_id).map(|&child| &items[child]) {
                None => report.errors.push(format!(
                    "item {id} lists child {child_id}, which is not in {scope}"
                )),
                Some(child) if child.parent_id.as_ref() != Some(id) => {
                    report.errors.push(format!(
                        "item {id} lists child {child_id}, whose parent is {}",
                        child
                            .parent_id
                            .as_ref()
                            .map(ItemId::as_str)
                            .unwrap_or("none")
                    ))
                }
                Some(_) => {}
            }
        }

        let Some(parent_id) = &item.parent_id else {
            continue;
        };
        let Some(&parent_position) = positions.get(parent_id) else {
            report.errors.push(format!(
                "item {id} has parent {parent_id}, which is not in {scope}"
            ));
            continue;
        };
        let parent = &items[parent_position];
        if !parent.child_ids.contains(id) {
            report.errors.push(format!(
                "item {id} has parent {parent_id}, which does not list it"
            ));
        }
        let Some(depth) = depths[position] else {
            report
                .errors
                .push(format!("item {id} is part of a parent cycle"));
            continue;
        };
        if depth > max_depth {
            report.errors.push(format!(
                "item {id} is nested deeper than the limit of {max_depth}"
            ));
        }
        if parent_position > position {
            report.warnings.push(format!(
                "item {id} is stored before its parent {parent_id}"
            ));
        } else if position
            >= *run_ends
                .entry(parent_position)
                .or_insert_with(|| end_of_run(items, parent_position))
        {
            report.warnings.push(format!(
                "item {id} is stored outside the run of its parent {parent_id}"
            ));
        }
    }
}

/// Depth of every item by flat position, each resolved once.
///
/// `None` marks items whose parent chain loops. A parent id that does not
/// resolve ends the chain, as in [`crate::hierarchy::depth_of`].
fn chain_depths(items: &[Item], positions: &HashMap<&ItemId, usize>) -> Vec<Option<usize>> {
    let mut resolved: Vec<Option<Option<usize>>> = vec![None; items.len()];
    let mut on_path = vec![false; items.len()];

    for start in 0..items.len() {
        if resolved[start].is_some() {
            continue;
        }
        let mut path = Vec::new();
        let mut cursor = start;
        // Depth of the last item on `path`.
        let tail_depth = loop {
            path.push(cursor);
            on_path[cursor] = true;
            let parent = items[cursor]
                .parent_id
                .as_ref()
                .and_then(|parent_id| positions.get(parent_id).copied());
            let Some(parent) = parent else {
                break Some(0);
            };
            if on_path[parent] {
                break None;
            }
            if let Some(known) = resolved[parent] {
                break known.map(|depth| depth + 1);
            }
            cursor = parent;
        };

        let mut depth = tail_depth;
        for &position in path.iter().rev() {
            resolved[position] = Some(depth);
            on_path[position] = false;
            depth = depth.map(|depth| depth + 1);
        }
    }

    resolved.into_iter().map(Option::flatten).collect()
}

/// Compares `store` against `snapshot` item by item.
///
/// Ids come out in store order; `removed` follows snapshot order.
pub fn diff_against_snapshot(snapshot: &Snapshot, store: &Store) -> SnapshotDiff {
    let before = item_slots(&snapshot.state);
    let after = item_slots(store);

    let mut diff = SnapshotDiff {
        change_index: snapshot.change_index,
        ..SnapshotDiff::default()
    };
    for (slot, item) in slots_in_order(store) {
        match before.get(&item.id) {
            None => diff.added.push(item.id.clone()),
            Some((old_slot, old_item)) if *old_slot != slot || *old_item != item => {
                diff.modified.push(item.id.clone())
            }
            Some(_) => {}
        }
    }
    diff.removed = slots_in_order(&snapshot.state)
        .filter(|(_, item)| !after.contains_key(&item.id))
        .map(|(_, item)| item.id.clone())
        .collect();

    debug!(
        "event=snapshot_diff module=history status=ok change_index={} added={} removed={} modified={}",
        diff.change_index,
        diff.added.len(),
        diff.removed.len(),
        diff.modified.len()
    );
    diff
}

/// Document id, group id and flat index of one item.
type ItemSlot<'a> = (&'a str, &'a str, usize);

fn slots_in_order(store: &Store) -> impl Iterator<Item = (ItemSlot<'_>, &Item)> {
    store.documents.iter().flat_map(|document| {
        document.groups.iter().flat_map(move |group| {
            group.items.iter().enumerate().map(move |(flat_index, item)| {
                ((document.id.as_str(), group.id.as_str(), flat_index), item)
            })
        })
    })
}

fn item_slots(store: &Store) -> HashMap<&ItemId, (ItemSlot<'_>, &Item)> {
    slots_in_order(store)
        .map(|(slot, item)| (&item.id, (slot, item)))
        .collect()
}

/// Replays both history stacks against scratch copies of `store`.
///
/// The undo stack is unwound newest-first through inverses; the redo stack
/// is re-applied newest-first. Each stack stops at its first failing entry,
/// since state beyond it is undefined.
pub fn diagnose_undo_issue(
    history: &History,
    store: &Store,
    manager: &OperationManager,
) -> UndoDiagnosis {
    let mut issues = Vec::new();

    let mut scratch = store.clone();
    for (entry_index, entry) in history.undo_entries().iter().enumerate().rev() {
        if let Err(err) = apply_inverse(entry, &mut scratch, manager) {
            let replayed = match entry {
                HistoryEntry::Operation(operation) => operation.inverse().ok(),
                HistoryEntry::Change(_) => None,
            };
            issues.push(classify(
                entry,
                replayed.as_ref(),
                &scratch,
                StackName::Undo,
                entry_index,
                &err.to_string(),
            ));
            break;
        }
    }

    let mut scratch = store.clone();
    for (entry_index, entry) in history.redo_entries().iter().enumerate().rev() {
        if let Err(err) = apply_forward(entry, &mut scratch, manager) {
            let replayed = match entry {
                HistoryEntry::Operation(operation) => Some(operation.clone()),
                HistoryEntry::Change(_) => None,
            };
            issues.push(classify(
                entry,
                replayed.as_ref(),
                &scratch,
                StackName::Redo,
                entry_index,
                &err.to_string(),
            ));
            break;
        }
    }

    let diagnosis = UndoDiagnosis {
        valid: issues.is_empty(),
        issues,
    };
    if !diagnosis.valid {
        warn!(
            "event=diagnose_undo module=history status=desync issues={}",
            diagnosis.issues.len()
        );
    }
    diagnosis
}

fn classify(
    entry: &HistoryEntry,
    replayed: Option<&Operation>,
    scratch: &Store,
    stack: StackName,
    entry_index: usize,
    cause: &str,
) -> UndoIssue {
    let issue = |kind, description: String| UndoIssue {
        kind,
        stack,
        entry_index,
        description,
    };

    let Some(operation) = replayed else {
        let item_id = entry.item_id();
        if !scratch.contains_item(item_id) {
            return issue(
                UndoIssueKind::MissingTarget,
                format!("change on {item_id} refers to a missing item"),
            );
        }
        return issue(UndoIssueKind::ReplayRejected, cause.to_string());
    };

    let (must_exist, must_be_absent) = operation.forward_requirements();
    let parent_ref = parent_reference(operation);
    if let Some(missing) = must_exist.iter().find(|id| !scratch.contains_item(id)) {
        let kind = if Some(missing) == parent_ref {
            UndoIssueKind::MissingParent
        } else {
            UndoIssueKind::MissingTarget
        };
        return issue(
            kind,
            format!(
                "{} on {} needs {missing}, which no longer exists",
                operation.kind().as_str(),
                operation.item_id
            ),
        );
    }
    if let Some(present) = must_be_absent.iter().find(|id| scratch.contains_item(id)) {
        return issue(
            UndoIssueKind::UnexpectedTarget,
            format!(
                "{} on {} would create {present}, which already exists",
                operation.kind().as_str(),
                operation.item_id
            ),
        );
    }
    issue(UndoIssueKind::ReplayRejected, cause.to_string())
}

/// Parent or sibling id the operation depends on besides its own target.
fn parent_reference(operation: &Operation) -> Option<&ItemId> {
    match &operation.params {
        OperationParams::Move { new_parent_id, .. }
        | OperationParams::Reparent { new_parent_id, .. } => new_parent_id.as_ref(),
        OperationParams::Create { parent_id, .. } => parent_id.as_ref(),
        OperationParams::Merge {
            previous_item_id, ..
        } => Some(previous_item_id),
        OperationParams::SetText { .. }
        | OperationParams::Split { .. }
        | OperationParams::Delete { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{diff_against_snapshot, validate_state, StateReport};
    use crate::history::snapshot::Snapshot;
    use crate::model::document::{Document, Group, Store};
    use crate::model::item::{Item, ItemId, ItemType};

    fn report_for(items: Vec<Item>) -> StateReport {
        let mut group = Group::new("bin-1", "Inbox");
        group.import_items(items);
        let mut document = Document::new("page-1", "Today");
        document.add_group(group);
        let mut store = Store::new();
        store.add_document(document);
        validate_state(&store, 1)
    }

    #[test]
    fn consistent_tree_is_valid() {
        let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
        parent.child_ids.push("b1".into());
        let report = report_for(vec![
            parent,
            Item::child_of("b1".into(), "a1".into(), ItemType::Task, "Child"),
        ]);
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn one_sided_links_are_errors() {
        let report = report_for(vec![
            Item::new("a1".into(), ItemType::Task, "Parent"),
            Item::child_of("b1".into(), "a1".into(), ItemType::Task, "Child"),
        ]);
        assert!(!report.valid);
        assert!(report.errors[0].contains("does not list it"));
    }

    #[test]
    fn child_stored_before_parent_is_a_warning() {
        let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
        parent.child_ids.push("b1".into());
        let report = report_for(vec![
            Item::child_of("b1".into(), "a1".into(), ItemType::Task, "Child"),
            parent,
        ]);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn grandchildren_exceed_default_depth() {
        let mut root = Item::new("a1".into(), ItemType::Task, "a1");
        root.child_ids.push("b1".into());
        let mut child = Item::child_of("b1".into(), "a1".into(), ItemType::Task, "b1");
        child.child_ids.push("c1".into());
        let report = report_for(vec![
            root,
            child,
            Item::child_of("c1".into(), "b1".into(), ItemType::Task, "c1"),
        ]);
        assert!(report.errors.iter().any(|error| error.contains("deeper")));
    }

    #[test]
    fn parent_cycle_is_reported_once_per_member() {
        let mut a = Item::child_of("a1".into(), "b1".into(), ItemType::Task, "a1");
        a.child_ids.push("b1".into());
        let mut b = Item::child_of("b1".into(), "a1".into(), ItemType::Task, "b1");
        b.child_ids.push("a1".into());
        let report = report_for(vec![a, b]);
        let cycles = report
            .errors
            .iter()
            .filter(|error| error.contains("parent cycle"))
            .count();
        assert_eq!(cycles, 2);
    }

    #[test]
    fn large_group_validates_in_linear_time() {
        let mut items = Vec::new();
        for index in 0..10_000 {
            let root_id = format!("r{index}");
            let child_id = format!("c{index}");
            let mut root = Item::new(root_id.as_str().into(), ItemType::Task, "root");
            root.child_ids.push(child_id.as_str().into());
            items.push(root);
            items.push(Item::child_of(
                child_id.as_str().into(),
                root_id.as_str().into(),
                ItemType::Task,
                "child",
            ));
        }

        let started = std::time::Instant::now();
        let report = report_for(items);

        assert!(report.valid, "{:?}", report.errors.first());
        assert!(report.warnings.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn snapshot_diff_lists_added_removed_and_modified_items() {
        let mut group = Group::new("bin-1", "Inbox");
        group.import_items(vec![
            Item::new("a1".into(), ItemType::Task, "keep"),
            Item::new("b1".into(), ItemType::Task, "edit me"),
            Item::new("c1".into(), ItemType::Task, "drop me"),
        ]);
        let mut document = Document::new("page-1", "Today");
        document.add_group(group);
        let mut store = Store::new();
        store.add_document(document);
        let snapshot = Snapshot {
            change_index: 4,
            timestamp: 0,
            state: store.clone(),
        };

        let items = &mut store.documents[0].groups[0].items;
        items[1].text = "edited".to_string();
        items.remove(2);
        items.push(Item::new("d1".into(), ItemType::Note, "new"));

        let diff = diff_against_snapshot(&snapshot, &store);
        assert_eq!(diff.change_index, 4);
        assert_eq!(diff.added, vec![ItemId::from("d1")]);
        assert_eq!(diff.removed, vec![ItemId::from("c1")]);
        assert_eq!(diff.modified, vec![ItemId::from("b1")]);

        let unchanged = diff_against_snapshot(&snapshot, &snapshot.state);
        assert!(unchanged.is_empty());
    }
}
