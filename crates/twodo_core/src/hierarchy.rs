//! Pure hierarchy queries over one group's flat item list.
//!
//! # Responsibility
//! - Translate between root order, child lists and flat-array positions.
//! - Answer depth/descendant questions for invariant checks.
//!
//! # Invariants
//! - Functions never mutate and never panic on dangling ids; desync is left
//!   for the state diagnostics to report.
//! - Parent-chain walks stop on revisits, so corrupted cyclic data terminates.

use crate::model::item::{Item, ItemId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Builds an id → item index for repeated lookups. O(n).
pub fn build_index(items: &[Item]) -> HashMap<&ItemId, &Item> {
    items.iter().map(|item| (&item.id, item)).collect()
}

/// Items with no parent, in flat order.
pub fn get_root_items(items: &[Item]) -> Vec<&Item> {
    items.iter().filter(|item| item.is_root()).collect()
}

/// The `root_index`-th root item, if any.
pub fn get_root_item_at_index(items: &[Item], root_index: usize) -> Option<&Item> {
    items.iter().filter(|item| item.is_root()).nth(root_index)
}

/// Resolves `item.child_ids` in order, skipping ids missing from `index`.
pub fn get_child_items<'a>(item: &Item, index: &HashMap<&ItemId, &'a Item>) -> Vec<&'a Item> {
    item.child_ids
        .iter()
        .filter_map(|child_id| index.get(child_id).copied())
        .collect()
}

/// Flat position where the `root_index`-th root item's run starts.
///
/// Returns `items.len()` when `root_index` is past the last root, which is
/// the append position.
pub fn get_flat_insert_index(items: &[Item], root_index: usize) -> usize {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_root())
        .nth(root_index)
        .map(|(flat_index, _)| flat_index)
        .unwrap_or(items.len())
}

/// Flat position of `id`.
pub fn flat_index_of(items: &[Item], id: &ItemId) -> Option<usize> {
    items.iter().position(|item| &item.id == id)
}

/// Index of `id` among root items, or `None` if it is absent or a child.
pub fn root_index_of(items: &[Item], id: &ItemId) -> Option<usize> {
    items
        .iter()
        .filter(|item| item.is_root())
        .position(|item| &item.id == id)
}

/// Position just after the contiguous run of descendants stored behind the
/// item at `flat_index`.
pub fn end_of_run(items: &[Item], flat_index: usize) -> usize {
    let Some(owner) = items.get(flat_index) else {
        return items.len();
    };
    let mut run: HashSet<&ItemId> = HashSet::from([&owner.id]);
    let mut cursor = flat_index + 1;
    while let Some(next) = items.get(cursor) {
        match next.parent_id.as_ref() {
            Some(parent_id) if run.contains(parent_id) => {
                run.insert(&next.id);
                cursor += 1;
            }
            _ => break,
        }
    }
    cursor
}

/// Number of ancestors above `id` (0 for roots).
pub fn depth_of(items: &[Item], id: &ItemId) -> Option<usize> {
    let index = build_index(items);
    let mut current = *index.get(id)?;
    let mut visited = HashSet::new();
    let mut depth = 0;
    while let Some(parent_id) = current.parent_id.as_ref() {
        if !visited.insert(parent_id) {
            break;
        }
        match index.get(parent_id) {
            Some(parent) => {
                depth += 1;
                current = parent;
            }
            None => break,
        }
    }
    Some(depth)
}

/// Height of the subtree below `item` (0 for a leaf).
pub fn subtree_height(items: &[Item], item: &Item) -> usize {
    let index = build_index(items);
    let mut visited = HashSet::new();
    height_inner(item, &index, &mut visited)
}

fn height_inner<'a>(
    item: &'a Item,
    index: &HashMap<&ItemId, &'a Item>,
    visited: &mut HashSet<&'a ItemId>,
) -> usize {
    if !visited.insert(&item.id) {
        return 0;
    }
    get_child_items(item, index)
        .into_iter()
        .map(|child| 1 + height_inner(child, index, visited))
        .max()
        .unwrap_or(0)
}

/// Whether `candidate` sits anywhere below `ancestor`.
pub fn is_descendant(items: &[Item], ancestor: &ItemId, candidate: &ItemId) -> bool {
    let index = build_index(items);
    let mut visited = HashSet::new();
    let mut cursor = index
        .get(candidate)
        .and_then(|item| item.parent_id.as_ref());
    while let Some(current) = cursor {
        if current == ancestor {
            return true;
        }
        if !visited.insert(current) {
            return false;
        }
        cursor = index.get(current).and_then(|item| item.parent_id.as_ref());
    }
    false
}

/// Every item below `id`, breadth first.
///
/// Follows both `child_ids` and `parent_id` back references so a cascade
/// still reaches children whose parent lost track of them.
pub fn descendant_ids(items: &[Item], id: &ItemId) -> Vec<ItemId> {
    let index = build_index(items);
    let mut seen: HashSet<&ItemId> = HashSet::from([id]);
    let mut queue = VecDeque::from([id]);
    let mut result = Vec::new();
    while let Some(current) = queue.pop_front() {
        let by_child_list = index
            .get(current)
            .map(|item| item.child_ids.iter().collect::<Vec<_>>())
            .unwrap_or_default();
        let by_back_reference = items
            .iter()
            .filter(|item| item.parent_id.as_ref() == Some(current))
            .map(|item| &item.id);
        for child_id in by_child_list.into_iter().chain(by_back_reference) {
            if index.contains_key(child_id) && seen.insert(child_id) {
                result.push(child_id.clone());
                queue.push_back(child_id);
            }
        }
    }
    result
}
