//! Operation validation and application.
//!
//! # Responsibility
//! - Resolve operation targets by stable id against the live store.
//! - Refuse mutations that would break structural invariants.
//! - Apply accepted mutations and return the committed operation carrying
//!   everything its inverse needs.
//!
//! # Invariants
//! - Every check runs before the first write; a rejected operation leaves
//!   the store untouched.
//! - Depth is checked symmetrically: target depth plus the height of the
//!   moved subtree must stay within `max_depth`.

use crate::config::EditorConfig;
use crate::hierarchy::{
    build_index, depth_of, descendant_ids, end_of_run, get_child_items, get_flat_insert_index,
    is_descendant, root_index_of, subtree_height,
};
use crate::model::document::{Group, GroupRef, ItemLocation, Store};
use crate::model::item::{Item, ItemId, ItemType};
use crate::operation::change::Change;
use crate::operation::error::{InvariantReason, OperationError, OperationResult};
use crate::operation::types::{
    CapturedItem, CapturedSubtree, FlatSlot, ItemData, MergeCapture, Operation,
    OperationParams,
};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Validates and applies operations against a borrowed store.
///
/// Holds no store state of its own; the same manager can serve any store.
#[derive(Debug, Clone)]
pub struct OperationManager {
    max_depth: usize,
}

impl Default for OperationManager {
    fn default() -> Self {
        Self::new(EditorConfig::default().max_depth)
    }
}

impl OperationManager {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.max_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Full-scan lookup of `item_id` across every document and group.
    pub fn find_item<'s>(&self, store: &'s Store, item_id: &ItemId) -> Option<ItemLocation<'s>> {
        store.find_item(item_id)
    }

    /// Applies `operation` and returns the committed form.
    ///
    /// The committed operation has its `old_*` fields and captured state
    /// taken from the store at the moment of application, so its inverse is
    /// exact even if the caller supplied stale values.
    ///
    /// # Errors
    /// - `ItemNotFound` / `ParentNotFound` / `GroupNotFound` for absent refs.
    /// - `InvariantViolation` for self-nest, cycle, nesting-depth, duplicate
    ///   id or non-adjacent merge.
    /// - `InvalidParams` when params do not fit the current item.
    /// - `StateDesync` when the target's parent link is already inconsistent.
    pub fn apply(&self, store: &mut Store, operation: &Operation) -> OperationResult<Operation> {
        let result = self.apply_inner(store, operation);
        match &result {
            Ok(_) => debug!(
                "event=operation_apply module=operation status=ok kind={} item={}",
                operation.kind().as_str(),
                operation.item_id
            ),
            Err(err) => warn!(
                "event=operation_apply module=operation status=rejected kind={} item={} error_kind={:?} error={}",
                operation.kind().as_str(),
                operation.item_id,
                err.kind(),
                err
            ),
        }
        result
    }

    /// Applies a field-level change and returns it with `old_value` filled.
    ///
    /// # Errors
    /// - `ItemNotFound` when the item is absent.
    /// - `InvalidParams` when the value does not fit the field or breaks item
    ///   validation.
    pub fn apply_change(&self, store: &mut Store, change: &Change) -> OperationResult<Change> {
        let address = store
            .locate(&change.item_id)
            .ok_or_else(|| OperationError::ItemNotFound(change.item_id.clone()))?;
        let item = &mut store.group_at_mut(address).items[address.item_index];

        let old_value = Change::read_field(item, change.field);
        let mut updated = item.clone();
        change.write_field(&mut updated)?;
        updated
            .validate()
            .map_err(|err| OperationError::invalid("value", err.to_string()))?;
        *item = updated;

        debug!(
            "event=change_apply module=operation status=ok field={} item={}",
            change.field.as_str(),
            change.item_id
        );
        Ok(Change {
            old_value,
            ..change.clone()
        })
    }

    fn apply_inner(&self, store: &mut Store, operation: &Operation) -> OperationResult<Operation> {
        let item_id = &operation.item_id;
        let locate = |store: &Store| {
            store
                .locate(item_id)
                .ok_or_else(|| OperationError::ItemNotFound(item_id.clone()))
        };

        let params = match &operation.params {
            OperationParams::SetText { new_text, .. } => {
                let address = locate(&*store)?;
                let item = &mut store.group_at_mut(address).items[address.item_index];
                let old_text = std::mem::replace(&mut item.text, new_text.clone());
                OperationParams::SetText {
                    new_text: new_text.clone(),
                    old_text,
                }
            }
            OperationParams::Move {
                new_parent_id,
                new_index,
                new_slots,
                ..
            } => {
                let address = locate(&*store)?;
                self.apply_move(
                    store.group_at_mut(address),
                    address.item_index,
                    new_parent_id.as_ref(),
                    *new_index,
                    new_slots,
                )?
            }
            OperationParams::Reparent {
                new_parent_id,
                new_depth,
                new_child_index,
                ..
            } => {
                let address = locate(&*store)?;
                self.apply_reparent(
                    store.group_at_mut(address),
                    address.item_index,
                    new_parent_id.as_ref(),
                    *new_depth,
                    *new_child_index,
                )?
            }
            OperationParams::Split {
                caret_position,
                new_item_id,
                restore,
            } => {
                let address = locate(&*store)?;
                if store.document_at(address).contains_item(new_item_id) {
                    return Err(OperationError::violation(
                        new_item_id,
                        InvariantReason::DuplicateId,
                    ));
                }
                apply_split(
                    store.group_at_mut(address),
                    address.item_index,
                    *caret_position,
                    new_item_id,
                    restore.as_ref(),
                )?
            }
            OperationParams::Merge {
                previous_item_id, ..
            } => {
                let address = locate(&*store)?;
                apply_merge(
                    store.group_at_mut(address),
                    address.item_index,
                    previous_item_id,
                )?
            }
            OperationParams::Create {
                item_type,
                parent_id,
                index,
                item_data,
                group,
                restore,
            } => self.apply_create(
                store,
                item_id,
                CreateRequest {
                    item_type: *item_type,
                    parent_id: parent_id.as_ref(),
                    index: *index,
                    item_data,
                    group: group.as_ref(),
                    restore: restore.as_ref(),
                },
            )?,
            OperationParams::Delete { .. } => {
                let address = locate(&*store)?;
                let group_ref = store.group_ref_at(address);
                apply_delete(store.group_at_mut(address), address.item_index, group_ref)?
            }
        };

        Ok(Operation {
            item_id: item_id.clone(),
            params,
            timestamp: operation.timestamp,
        })
    }

    /// Checks that `item` may be placed under `parent_id` in `group`.
    fn check_nesting(&self, group: &Group, item: &Item, parent_id: &ItemId) -> OperationResult<()> {
        if parent_id == &item.id {
            return Err(OperationError::violation(&item.id, InvariantReason::SelfNest));
        }
        if !group.contains(parent_id) {
            return Err(OperationError::ParentNotFound(parent_id.clone()));
        }
        if is_descendant(&group.items, &item.id, parent_id) {
            return Err(OperationError::violation(&item.id, InvariantReason::Cycle));
        }
        let height = subtree_height(&group.items, item);
        self.check_destination(group, &item.id, parent_id, height)
    }

    /// Depth check shared by moves and creates.
    fn check_destination(
        &self,
        group: &Group,
        item_id: &ItemId,
        parent_id: &ItemId,
        moved_height: usize,
    ) -> OperationResult<()> {
        let parent = group
            .item(parent_id)
            .ok_or_else(|| OperationError::ParentNotFound(parent_id.clone()))?;
        let target_depth = depth_of(&group.items, parent_id).unwrap_or(0) + 1;
        if target_depth + moved_height > self.max_depth {
            return Err(OperationError::violation(item_id, InvariantReason::NestingDepth));
        }

        let index = build_index(&group.items);
        let destination_too_deep = get_child_items(parent, &index)
            .into_iter()
            .filter(|child| &child.id != item_id)
            .any(|child| target_depth + subtree_height(&group.items, child) > self.max_depth);
        if destination_too_deep {
            return Err(OperationError::violation(item_id, InvariantReason::NestingDepth));
        }
        Ok(())
    }

    fn apply_move(
        &self,
        group: &mut Group,
        position: usize,
        new_parent_id: Option<&ItemId>,
        new_index: usize,
        new_slots: &[FlatSlot],
    ) -> OperationResult<OperationParams> {
        let item = &group.items[position];
        let item_id = item.id.clone();
        let (old_parent_id, old_index) = current_slot(group, item)?;
        let parent_position = match new_parent_id {
            Some(parent_id) => {
                self.check_nesting(group, item, parent_id)?;
                group.position(parent_id)
            }
            None => None,
        };

        let block_positions = block_positions(&group.items, &item_id, position);
        let old_slots: Vec<FlatSlot> = block_positions
            .iter()
            .map(|&flat_index| FlatSlot {
                item_id: group.items[flat_index].id.clone(),
                flat_index,
            })
            .collect();
        if !new_slots.is_empty() {
            let members: HashSet<&ItemId> = old_slots.iter().map(|slot| &slot.item_id).collect();
            if new_slots.len() != old_slots.len()
                || new_slots.iter().any(|slot| !members.contains(&slot.item_id))
            {
                return Err(OperationError::desync(
                    &item_id,
                    "recorded flat slots do not match the moved block",
                ));
            }
        }

        if let Some(old_parent_id) = &old_parent_id {
            remove_child_ref(group, old_parent_id, &item_id);
        }
        let mut block = take_block(group, &block_positions);
        block[0].parent_id = new_parent_id.cloned();

        let committed_index = if new_slots.is_empty() {
            match parent_position {
                Some(parent_position) => {
                    let parent_position = shifted(parent_position, &block_positions);
                    insert_child_block(group, parent_position, block, new_index)
                }
                None => insert_root_block(group, block, new_index),
            }
        } else {
            let child_index = new_parent_id
                .and_then(|parent_id| group.item_mut(parent_id))
                .map(|parent| {
                    let index = new_index.min(parent.child_ids.len());
                    parent.child_ids.insert(index, item_id.clone());
                    index
                });
            place_at_slots(group, block, new_slots);
            child_index
                .or_else(|| root_index_of(&group.items, &item_id))
                .unwrap_or(new_index)
        };

        let placed: HashMap<&ItemId, usize> = group
            .items
            .iter()
            .enumerate()
            .map(|(flat_index, item)| (&item.id, flat_index))
            .collect();
        let new_slots = old_slots
            .iter()
            .filter_map(|slot| {
                placed.get(&slot.item_id).map(|&flat_index| FlatSlot {
                    item_id: slot.item_id.clone(),
                    flat_index,
                })
            })
            .collect();

        Ok(OperationParams::Move {
            new_parent_id: new_parent_id.cloned(),
            new_index: committed_index,
            old_parent_id,
            old_index,
            new_slots,
            old_slots,
        })
    }

    fn apply_reparent(
        &self,
        group: &mut Group,
        position: usize,
        new_parent_id: Option<&ItemId>,
        new_depth: usize,
        new_child_index: Option<usize>,
    ) -> OperationResult<OperationParams> {
        let item = &group.items[position];
        let item_id = item.id.clone();
        let (old_parent_id, old_index) = current_slot(group, item)?;
        let old_depth = depth_of(&group.items, &item_id).unwrap_or(0);

        let target_depth = match new_parent_id {
            Some(parent_id) => {
                self.check_nesting(group, item, parent_id)?;
                depth_of(&group.items, parent_id).unwrap_or(0) + 1
            }
            None => 0,
        };
        if new_depth != target_depth {
            return Err(OperationError::invalid(
                "new_depth",
                format!("expected {target_depth}, got {new_depth}"),
            ));
        }

        let old_child_index = old_parent_id.as_ref().map(|_| old_index);
        if let Some(old_parent_id) = &old_parent_id {
            remove_child_ref(group, old_parent_id, &item_id);
        }
        let mut committed_child_index = None;
        if let Some(parent_id) = new_parent_id {
            if let Some(parent) = group.item_mut(parent_id) {
                let slot = new_child_index
                    .unwrap_or(parent.child_ids.len())
                    .min(parent.child_ids.len());
                parent.child_ids.insert(slot, item_id.clone());
                committed_child_index = Some(slot);
            }
        }
        group.items[position].parent_id = new_parent_id.cloned();

        Ok(OperationParams::Reparent {
            new_parent_id: new_parent_id.cloned(),
            new_depth,
            old_parent_id,
            old_depth,
            new_child_index: committed_child_index,
            old_child_index,
        })
    }

    fn apply_create(
        &self,
        store: &mut Store,
        item_id: &ItemId,
        request: CreateRequest<'_>,
    ) -> OperationResult<OperationParams> {
        let (document_index, group_index) = match (request.parent_id, request.group) {
            (Some(parent_id), _) => {
                let address = store
                    .locate(parent_id)
                    .ok_or_else(|| OperationError::ParentNotFound(parent_id.clone()))?;
                (address.document_index, address.group_index)
            }
            (None, Some(group_ref)) => store.resolve_group(group_ref).ok_or_else(|| {
                OperationError::GroupNotFound {
                    document_id: group_ref.document_id.clone(),
                    group_id: group_ref.group_id.clone(),
                }
            })?,
            (None, None) => store
                .default_group()
                .ok_or_else(|| OperationError::GroupNotFound {
                    document_id: String::new(),
                    group_id: String::new(),
                })?,
        };

        // Restored subtrees keep their captured flat slots; fresh items are
        // a one-item block placed by index.
        let (restored, fresh): (Vec<CapturedItem>, Option<Item>) = match request.restore {
            Some(subtree) => {
                if &subtree.root.item.id != item_id {
                    return Err(OperationError::invalid(
                        "restore",
                        "captured root does not match item_id",
                    ));
                }
                let restored = subtree.items_in_flat_order().into_iter().cloned().collect();
                (restored, None)
            }
            None => {
                let mut item = Item::new(
                    item_id.clone(),
                    request.item_type,
                    request.item_data.text.clone(),
                );
                item.metadata = request.item_data.metadata.clone();
                item.parent_id = request.parent_id.cloned();
                item.validate()
                    .map_err(|err| OperationError::invalid("item_data", err.to_string()))?;
                (Vec::new(), Some(item))
            }
        };
        let incoming: Vec<&Item> = restored
            .iter()
            .map(|captured| &captured.item)
            .chain(fresh.iter())
            .collect();

        let document = &store.documents[document_index];
        if let Some(duplicate) = incoming.iter().find(|item| document.contains_item(&item.id)) {
            return Err(OperationError::violation(
                &duplicate.id,
                InvariantReason::DuplicateId,
            ));
        }
        let group_ref = GroupRef::new(
            document.id.clone(),
            document.groups[group_index].id.clone(),
        );

        let group = &mut store.documents[document_index].groups[group_index];
        if let Some(parent_id) = request.parent_id {
            let subtree: Vec<Item> = incoming.iter().map(|item| (*item).clone()).collect();
            let height = subtree
                .iter()
                .find(|item| &item.id == item_id)
                .map(|root| subtree_height(&subtree, root))
                .unwrap_or(0);
            self.check_destination(group, item_id, parent_id, height)?;
        }

        let committed_index = match fresh {
            Some(item) => {
                match request.parent_id.and_then(|parent_id| group.position(parent_id)) {
                    Some(parent_position) => {
                        insert_child_block(group, parent_position, vec![item], request.index)
                    }
                    None => insert_root_block(group, vec![item], request.index),
                }
            }
            None => {
                for captured in restored {
                    let at = captured.flat_index.min(group.items.len());
                    group.items.insert(at, captured.item);
                }
                match request.parent_id.and_then(|parent_id| group.position(parent_id)) {
                    Some(parent_position) => {
                        let parent = &mut group.items[parent_position];
                        let slot = request.index.min(parent.child_ids.len());
                        parent.child_ids.insert(slot, item_id.clone());
                        slot
                    }
                    None => root_index_of(&group.items, item_id).unwrap_or(request.index),
                }
            }
        };

        Ok(OperationParams::Create {
            item_type: request.item_type,
            parent_id: request.parent_id.cloned(),
            index: committed_index,
            item_data: request.item_data.clone(),
            group: Some(group_ref),
            restore: request.restore.cloned(),
        })
    }
}

struct CreateRequest<'a> {
    item_type: ItemType,
    parent_id: Option<&'a ItemId>,
    index: usize,
    item_data: &'a ItemData,
    group: Option<&'a GroupRef>,
    restore: Option<&'a CapturedSubtree>,
}

/// Current `(parent, index)` slot: root index for roots, child-list index
/// for children.
fn current_slot(group: &Group, item: &Item) -> OperationResult<(Option<ItemId>, usize)> {
    match &item.parent_id {
        None => Ok((None, root_index_of(&group.items, &item.id).unwrap_or(0))),
        Some(parent_id) => {
            let parent = group.item(parent_id).ok_or_else(|| {
                OperationError::desync(&item.id, format!("parent {parent_id} is missing"))
            })?;
            let index = parent
                .child_ids
                .iter()
                .position(|child_id| child_id == &item.id)
                .ok_or_else(|| {
                    OperationError::desync(
                        &item.id,
                        format!("not listed in child_ids of {parent_id}"),
                    )
                })?;
            Ok((Some(parent_id.clone()), index))
        }
    }
}

/// Flat positions of the item at `position` and all its descendants,
/// ascending.
fn block_positions(items: &[Item], item_id: &ItemId, position: usize) -> Vec<usize> {
    let members: HashSet<ItemId> = descendant_ids(items, item_id).into_iter().collect();
    let mut positions: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| members.contains(&item.id))
        .map(|(index, _)| index)
        .collect();
    positions.push(position);
    positions.sort_unstable();
    positions
}

/// Removes the block at `positions` (ascending). The item at the first
/// position in `positions` that is not a descendant ends up first in the
/// returned block; descendants follow in flat order.
fn take_block(group: &mut Group, positions: &[usize]) -> Vec<Item> {
    let mut removed: Vec<Item> = Vec::with_capacity(positions.len());
    for &position in positions.iter().rev() {
        removed.push(group.items.remove(position));
    }
    removed.reverse();
    // Owner first: it is the only member without a parent inside the block.
    let owner_index = removed
        .iter()
        .position(|candidate| {
            !removed
                .iter()
                .any(|other| candidate.parent_id.as_ref() == Some(&other.id))
        })
        .unwrap_or(0);
    let owner = removed.remove(owner_index);
    std::iter::once(owner).chain(removed).collect()
}

/// Position of `position` after the flat slots in `removed` were taken out.
fn shifted(position: usize, removed: &[usize]) -> usize {
    position - removed.iter().filter(|&&slot| slot < position).count()
}

fn remove_child_ref(group: &mut Group, parent_id: &ItemId, child_id: &ItemId) -> Option<usize> {
    let parent = group.item_mut(parent_id)?;
    let index = parent.child_ids.iter().position(|id| id == child_id)?;
    parent.child_ids.remove(index);
    Some(index)
}

/// Inserts a root-owned block at `root_index` (clamped). Returns the index
/// actually used.
fn insert_root_block(group: &mut Group, block: Vec<Item>, root_index: usize) -> usize {
    let root_count = group.items.iter().filter(|item| item.is_root()).count();
    let index = root_index.min(root_count);
    let at = get_flat_insert_index(&group.items, index);
    group.items.splice(at..at, block);
    index
}

/// Lists the block owner under the parent at `parent_position` and stores
/// the block in the parent's run, ahead of the sibling that now follows it
/// in `child_ids`. Returns the child index used.
fn insert_child_block(
    group: &mut Group,
    parent_position: usize,
    block: Vec<Item>,
    child_index: usize,
) -> usize {
    let parent = &mut group.items[parent_position];
    let index = child_index.min(parent.child_ids.len());
    if let Some(owner) = block.first() {
        parent.child_ids.insert(index, owner.id.clone());
    }
    let next_sibling = parent.child_ids.get(index + 1).cloned();
    let run_end = end_of_run(&group.items, parent_position);
    let at = next_sibling
        .and_then(|sibling_id| group.position(&sibling_id))
        .filter(|&position| position > parent_position && position < run_end)
        .unwrap_or(run_end);
    group.items.splice(at..at, block);
    index
}

/// Reinserts `block` at recorded flat slots, lowest slot first, which
/// reproduces the recorded order exactly when the rest of the list is
/// unchanged.
fn place_at_slots(group: &mut Group, mut block: Vec<Item>, slots: &[FlatSlot]) {
    let mut ordered: Vec<&FlatSlot> = slots.iter().collect();
    ordered.sort_by_key(|slot| slot.flat_index);
    for slot in ordered {
        if let Some(member) = block.iter().position(|item| item.id == slot.item_id) {
            let item = block.swap_remove(member);
            let at = slot.flat_index.min(group.items.len());
            group.items.insert(at, item);
        }
    }
}

fn apply_split(
    group: &mut Group,
    position: usize,
    caret_position: usize,
    new_item_id: &ItemId,
    restore: Option<&CapturedItem>,
) -> OperationResult<OperationParams> {
    let item = &group.items[position];
    let item_id = item.id.clone();
    let char_count = item.text.chars().count();
    if caret_position > char_count {
        return Err(OperationError::invalid(
            "caret_position",
            format!("{caret_position} is past the end of a {char_count}-char text"),
        ));
    }
    if let Some(restore) = restore {
        if &restore.item.id != new_item_id {
            return Err(OperationError::invalid(
                "restore",
                "restored item does not match new_item_id",
            ));
        }
        if let Some(missing) = restore
            .item
            .child_ids
            .iter()
            .find(|child_id| !item.child_ids.contains(child_id))
        {
            return Err(OperationError::desync(
                &item_id,
                format!("expected child {missing} to hand back on split"),
            ));
        }
    }
    let (parent_id, slot) = current_slot(group, item)?;

    let byte_at = item
        .text
        .char_indices()
        .nth(caret_position)
        .map(|(byte, _)| byte)
        .unwrap_or(item.text.len());
    let kind = item.kind;
    let tail = group.items[position].text.split_off(byte_at);

    let new_item = match restore {
        Some(restore) => {
            let mut restored = restore.item.clone();
            restored.text = tail;
            restored.parent_id = parent_id.clone();
            let handed_back: HashSet<&ItemId> = restore.item.child_ids.iter().collect();
            group.items[position]
                .child_ids
                .retain(|child_id| !handed_back.contains(child_id));
            for child in group
                .items
                .iter_mut()
                .filter(|candidate| handed_back.contains(&candidate.id))
            {
                child.parent_id = Some(new_item_id.clone());
            }
            restored
        }
        None => {
            let mut created = Item::new(new_item_id.clone(), kind, tail);
            created.parent_id = parent_id.clone();
            created
        }
    };

    let at = match restore {
        Some(restore) => restore.flat_index.min(group.items.len()),
        None => end_of_run(&group.items, position),
    };
    if let Some(parent_id) = &parent_id {
        if let Some(parent) = group.item_mut(parent_id) {
            parent.child_ids.insert(slot + 1, new_item_id.clone());
        }
    }
    group.items.insert(at, new_item);

    Ok(OperationParams::Split {
        caret_position,
        new_item_id: new_item_id.clone(),
        restore: restore.cloned(),
    })
}

fn apply_merge(
    group: &mut Group,
    position: usize,
    previous_item_id: &ItemId,
) -> OperationResult<OperationParams> {
    let item = &group.items[position];
    let previous = group
        .item(previous_item_id)
        .ok_or_else(|| OperationError::ItemNotFound(previous_item_id.clone()))?;
    if item.parent_id != previous.parent_id {
        return Err(OperationError::violation(&item.id, InvariantReason::NotSibling));
    }
    let (_, item_slot) = current_slot(group, item)?;
    let (_, previous_slot) = current_slot(group, previous)?;
    if previous_slot + 1 != item_slot {
        return Err(OperationError::violation(&item.id, InvariantReason::NotSibling));
    }

    let captured = MergeCapture {
        caret_position: previous.text.chars().count(),
        merged: CapturedItem {
            flat_index: position,
            item: item.clone(),
        },
    };

    let merged = group.items.remove(position);
    if let Some(parent_id) = &merged.parent_id {
        remove_child_ref(group, parent_id, &merged.id);
    }
    for child in group
        .items
        .iter_mut()
        .filter(|candidate| merged.child_ids.contains(&candidate.id))
    {
        child.parent_id = Some(previous_item_id.clone());
    }
    if let Some(previous) = group.item_mut(previous_item_id) {
        previous.text.push_str(&merged.text);
        previous.child_ids.extend(merged.child_ids.iter().cloned());
    }

    Ok(OperationParams::Merge {
        previous_item_id: previous_item_id.clone(),
        captured: Some(captured),
    })
}

fn apply_delete(
    group: &mut Group,
    position: usize,
    group_ref: GroupRef,
) -> OperationResult<OperationParams> {
    let item = &group.items[position];
    let item_id = item.id.clone();
    let (parent_id, index) = current_slot(group, item)?;
    let positions = block_positions(&group.items, &item_id, position);

    let root = CapturedItem {
        flat_index: position,
        item: item.clone(),
    };
    let descendants: Vec<CapturedItem> = positions
        .iter()
        .filter(|&&slot| slot != position)
        .map(|&slot| CapturedItem {
            flat_index: slot,
            item: group.items[slot].clone(),
        })
        .collect();

    if let Some(parent_id) = &parent_id {
        remove_child_ref(group, parent_id, &item_id);
    }
    for &slot in positions.iter().rev() {
        group.items.remove(slot);
    }

    Ok(OperationParams::Delete {
        deleted_item: Some(CapturedSubtree {
            root,
            descendants,
            parent_id,
            index,
            group: group_ref,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::{shifted, OperationManager};
    use crate::model::document::{Document, Group, Store};
    use crate::model::item::{Item, ItemId, ItemType};
    use crate::operation::error::{ErrorKind, InvariantReason};
    use crate::operation::types::{FlatSlot, Operation, OperationParams};

    fn slot(item_id: &str, flat_index: usize) -> FlatSlot {
        FlatSlot {
            item_id: item_id.into(),
            flat_index,
        }
    }

    fn store_with(items: Vec<Item>) -> Store {
        let mut group = Group::new("bin-1", "Inbox");
        group.items = items;
        let mut document = Document::new("page-1", "Today");
        document.add_group(group);
        let mut store = Store::new();
        store.add_document(document);
        store
    }

    fn ids(store: &Store) -> Vec<&str> {
        store.documents[0].groups[0]
            .items
            .iter()
            .map(|item| item.id.as_str())
            .collect()
    }

    #[test]
    fn shifted_accounts_for_earlier_removals() {
        assert_eq!(shifted(5, &[1, 2, 7]), 3);
        assert_eq!(shifted(0, &[1]), 0);
    }

    #[test]
    fn move_root_with_children_carries_the_run() {
        let mut r1 = Item::new("r1".into(), ItemType::Task, "r1");
        r1.child_ids = vec!["c1".into()];
        let mut store = store_with(vec![
            r1,
            Item::child_of("c1".into(), "r1".into(), ItemType::Task, "c1"),
            Item::new("r2".into(), ItemType::Task, "r2"),
        ]);
        let manager = OperationManager::new(1);

        let committed = manager
            .apply(&mut store, &Operation::move_item("r1".into(), None, 1))
            .unwrap();

        assert_eq!(ids(&store), ["r2", "r1", "c1"]);
        assert_eq!(
            committed.params,
            OperationParams::Move {
                new_parent_id: None,
                new_index: 1,
                old_parent_id: None,
                old_index: 0,
                new_slots: vec![slot("r1", 1), slot("c1", 2)],
                old_slots: vec![slot("r1", 0), slot("c1", 1)],
            }
        );
    }

    #[test]
    fn undoing_move_of_out_of_run_child_restores_flat_slot() {
        let mut r1 = Item::new("r1".into(), ItemType::Task, "r1");
        r1.child_ids = vec!["c1".into()];
        let original = store_with(vec![
            r1,
            Item::new("r2".into(), ItemType::Task, "r2"),
            Item::child_of("c1".into(), "r1".into(), ItemType::Task, "c1"),
        ]);
        let mut store = original.clone();
        let manager = OperationManager::new(1);

        let committed = manager
            .apply(&mut store, &Operation::move_item("c1".into(), None, 0))
            .unwrap();
        assert_eq!(ids(&store), ["c1", "r1", "r2"]);

        manager.apply(&mut store, &committed.inverse().unwrap()).unwrap();

        assert_eq!(store, original);
    }

    #[test]
    fn reparent_keeps_flat_position() {
        let mut store = store_with(vec![
            Item::new("r1".into(), ItemType::Task, "r1"),
            Item::new("r2".into(), ItemType::Task, "r2"),
        ]);
        let manager = OperationManager::new(1);

        manager
            .apply(
                &mut store,
                &Operation::reparent("r2".into(), Some("r1".into()), 1),
            )
            .unwrap();

        assert_eq!(ids(&store), ["r1", "r2"]);
        let group = &store.documents[0].groups[0];
        assert_eq!(group.items[0].child_ids, vec![ItemId::from("r2")]);
        assert_eq!(group.items[1].parent_id, Some(ItemId::from("r1")));
    }

    #[test]
    fn reparent_under_child_is_allowed_with_deeper_limit() {
        let mut r1 = Item::new("r1".into(), ItemType::Task, "r1");
        r1.child_ids = vec!["c1".into()];
        let mut store = store_with(vec![
            r1,
            Item::child_of("c1".into(), "r1".into(), ItemType::Task, "c1"),
            Item::new("r2".into(), ItemType::Task, "r2"),
        ]);
        let manager = OperationManager::new(2);

        let committed = manager
            .apply(
                &mut store,
                &Operation::reparent("r2".into(), Some("c1".into()), 2),
            )
            .unwrap();

        let group = &store.documents[0].groups[0];
        assert_eq!(group.items[1].child_ids, vec![ItemId::from("r2")]);
        assert_eq!(group.items[2].parent_id, Some(ItemId::from("c1")));

        manager
            .apply(&mut store, &committed.inverse().unwrap())
            .unwrap();
        let err = manager
            .apply(
                &mut store,
                &Operation::reparent("r2".into(), Some("c1".into()), 1),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperationParams);
    }

    #[test]
    fn create_under_child_is_too_deep() {
        let mut r1 = Item::new("r1".into(), ItemType::Task, "r1");
        r1.child_ids = vec!["c1".into()];
        let mut store = store_with(vec![
            r1,
            Item::child_of("c1".into(), "r1".into(), ItemType::Task, "c1"),
        ]);
        let manager = OperationManager::new(1);

        let err = manager
            .apply(
                &mut store,
                &Operation::create(
                    "n1".into(),
                    ItemType::Task,
                    Some("c1".into()),
                    0,
                    Default::default(),
                ),
            )
            .unwrap_err();

        assert_eq!(err.reason(), Some(InvariantReason::NestingDepth));
        assert_eq!(ids(&store), ["r1", "c1"]);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let mut store = store_with(vec![Item::new("r1".into(), ItemType::Text, "héllo wörld")]);
        let manager = OperationManager::new(1);

        manager
            .apply(&mut store, &Operation::split("r1".into(), 6, "r2".into()))
            .unwrap();

        let group = &store.documents[0].groups[0];
        assert_eq!(group.items[0].text, "héllo ");
        assert_eq!(group.items[1].text, "wörld");
        assert_eq!(group.items[1].kind, ItemType::Text);
    }
}
