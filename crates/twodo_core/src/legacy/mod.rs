//! Flat-index compatibility surface.
//!
//! # Responsibility
//! - Accept element moves addressed by flat position within a group.
//! - Resolve positions to stable ids, delegate to the editor, and report the
//!   resulting positions back as flat indices.
//!
//! # Invariants
//! - No invariant check lives here; every mutation goes through the editor,
//!   so it is validated, recorded and signalled like any id-based edit.
//! - Target indices are read before the source is removed; the shift caused
//!   by removal is accounted for here, not by callers.

use crate::model::document::{Group, Store};
use crate::model::item::{Item, ItemId};
use crate::operation::error::{OperationError, OperationResult};
use crate::operation::types::Operation;
use crate::service::editor::Editor;
use crate::signal::SignalBus;
use log::debug;
use serde::{Deserialize, Serialize};

/// Where an element ended up, in flat indices of its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPosition {
    pub item_id: ItemId,
    pub flat_index: usize,
    pub parent_flat_index: Option<usize>,
}

/// Index-addressed adapter over an [`Editor`].
pub struct LegacyIndexAdapter<'e, 's, B: SignalBus> {
    editor: &'e mut Editor<'s, B>,
}

impl<'e, 's, B: SignalBus> LegacyIndexAdapter<'e, 's, B> {
    pub fn new(editor: &'e mut Editor<'s, B>) -> Self {
        Self { editor }
    }

    /// Moves the element at `source_index` to the root slot that currently
    /// starts at flat `target_index`, un-nesting it if it was a child.
    ///
    /// `target_index == len` appends after the last root.
    ///
    /// # Errors
    /// - `GroupNotFound` / `IndexOutOfRange` for bad addresses.
    /// - Anything the editor rejects the resulting move with.
    pub fn move_element(
        &mut self,
        document_id: &str,
        group_id: &str,
        source_index: usize,
        target_index: usize,
    ) -> OperationResult<LegacyPosition> {
        let (source_id, root_index) = {
            let group = resolve_group(self.editor.store(), document_id, group_id)?;
            let source = item_at(group, source_index)?;
            if target_index > group.items.len() {
                return Err(OperationError::IndexOutOfRange {
                    index: target_index,
                    len: group.items.len(),
                });
            }
            // Roots ahead of the target, not counting the source itself,
            // which is removed before it is reinserted.
            let root_index = group.items[..target_index]
                .iter()
                .filter(|item| item.is_root() && item.id != source.id)
                .count();
            (source.id.clone(), root_index)
        };

        debug!(
            "event=legacy_move module=legacy status=resolved item={} source_index={} target_index={} root_index={}",
            source_id, source_index, target_index, root_index
        );
        self.editor
            .try_apply(&Operation::move_item(source_id.clone(), None, root_index))?;
        self.position_of(document_id, group_id, &source_id)
    }

    /// Nests the element at `source_index` under the element at
    /// `target_index`, appended after the target's existing children.
    ///
    /// # Errors
    /// - `GroupNotFound` / `IndexOutOfRange` for bad addresses.
    /// - `InvariantViolation` for self-nest, cycles or nesting depth.
    pub fn nest_element(
        &mut self,
        document_id: &str,
        group_id: &str,
        source_index: usize,
        target_index: usize,
    ) -> OperationResult<LegacyPosition> {
        let (source_id, target_id, child_count) = {
            let group = resolve_group(self.editor.store(), document_id, group_id)?;
            let source = item_at(group, source_index)?;
            let target = item_at(group, target_index)?;
            let child_count = target
                .child_ids
                .iter()
                .filter(|child_id| **child_id != source.id)
                .count();
            (source.id.clone(), target.id.clone(), child_count)
        };

        debug!(
            "event=legacy_nest module=legacy status=resolved item={} parent={}",
            source_id, target_id
        );
        self.editor.try_apply(&Operation::move_item(
            source_id.clone(),
            Some(target_id),
            child_count,
        ))?;
        self.position_of(document_id, group_id, &source_id)
    }

    /// Moves child `child_index` of the element at `parent_index` so it sits
    /// before the child currently at `target_child_index` (or last when
    /// `target_child_index` equals the child count).
    ///
    /// # Errors
    /// - `GroupNotFound` / `IndexOutOfRange` for bad addresses.
    pub fn reorder_child_element(
        &mut self,
        document_id: &str,
        group_id: &str,
        parent_index: usize,
        child_index: usize,
        target_child_index: usize,
    ) -> OperationResult<LegacyPosition> {
        let (child_id, parent_id, new_index) = {
            let group = resolve_group(self.editor.store(), document_id, group_id)?;
            let parent = item_at(group, parent_index)?;
            let len = parent.child_ids.len();
            let child_id = parent
                .child_ids
                .get(child_index)
                .ok_or(OperationError::IndexOutOfRange {
                    index: child_index,
                    len,
                })?;
            if target_child_index > len {
                return Err(OperationError::IndexOutOfRange {
                    index: target_child_index,
                    len,
                });
            }
            let new_index = if target_child_index > child_index {
                target_child_index - 1
            } else {
                target_child_index
            };
            (child_id.clone(), parent.id.clone(), new_index)
        };

        debug!(
            "event=legacy_reorder module=legacy status=resolved item={} parent={} new_index={}",
            child_id, parent_id, new_index
        );
        self.editor.try_apply(&Operation::move_item(
            child_id.clone(),
            Some(parent_id),
            new_index,
        ))?;
        self.position_of(document_id, group_id, &child_id)
    }

    fn position_of(
        &self,
        document_id: &str,
        group_id: &str,
        item_id: &ItemId,
    ) -> OperationResult<LegacyPosition> {
        let group = resolve_group(self.editor.store(), document_id, group_id)?;
        let flat_index = group
            .position(item_id)
            .ok_or_else(|| OperationError::ItemNotFound(item_id.clone()))?;
        let parent_flat_index = group.items[flat_index]
            .parent_id
            .as_ref()
            .and_then(|parent_id| group.position(parent_id));
        Ok(LegacyPosition {
            item_id: item_id.clone(),
            flat_index,
            parent_flat_index,
        })
    }
}

fn resolve_group<'a>(
    store: &'a Store,
    document_id: &str,
    group_id: &str,
) -> OperationResult<&'a Group> {
    store
        .group(document_id, group_id)
        .ok_or_else(|| OperationError::GroupNotFound {
            document_id: document_id.to_string(),
            group_id: group_id.to_string(),
        })
}

fn item_at(group: &Group, index: usize) -> OperationResult<&Item> {
    group.items.get(index).ok_or(OperationError::IndexOutOfRange {
        index,
        len: group.items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::LegacyIndexAdapter;
    use crate::model::document::{Document, Group, Store};
    use crate::model::item::{Item, ItemType};
    use crate::operation::error::{ErrorKind, InvariantReason};
    use crate::service::editor::Editor;
    use crate::signal::NullBus;

    fn store(items: Vec<Item>) -> Store {
        let mut group = Group::new("bin-1", "Inbox");
        group.items = items;
        let mut document = Document::new("page-1", "Today");
        document.add_group(group);
        let mut store = Store::new();
        store.add_document(document);
        store
    }

    fn roots() -> Vec<Item> {
        ["r1", "r2", "r3"]
            .into_iter()
            .map(|id| Item::new(id.into(), ItemType::Task, id))
            .collect()
    }

    fn order(editor: &Editor<'_, NullBus>) -> Vec<String> {
        editor.store().documents[0].groups[0]
            .items
            .iter()
            .map(|item| item.id.to_string())
            .collect()
    }

    #[test]
    fn move_forward_accounts_for_removal_shift() {
        let mut store = store(roots());
        let mut editor = Editor::new(&mut store, NullBus);
        let position = LegacyIndexAdapter::new(&mut editor)
            .move_element("page-1", "bin-1", 0, 2)
            .unwrap();
        assert_eq!(order(&editor), ["r2", "r1", "r3"]);
        assert_eq!(position.flat_index, 1);
        assert_eq!(position.parent_flat_index, None);
    }

    #[test]
    fn move_to_end_appends() {
        let mut store = store(roots());
        let mut editor = Editor::new(&mut store, NullBus);
        LegacyIndexAdapter::new(&mut editor)
            .move_element("page-1", "bin-1", 0, 3)
            .unwrap();
        assert_eq!(order(&editor), ["r2", "r3", "r1"]);
    }

    #[test]
    fn nest_under_self_is_refused_by_the_core() {
        let mut store = store(roots());
        let mut editor = Editor::new(&mut store, NullBus);
        let err = LegacyIndexAdapter::new(&mut editor)
            .nest_element("page-1", "bin-1", 1, 1)
            .unwrap_err();
        assert_eq!(err.reason(), Some(InvariantReason::SelfNest));
        assert!(!editor.can_undo());
    }

    #[test]
    fn out_of_range_index_is_not_found() {
        let mut store = store(roots());
        let mut editor = Editor::new(&mut store, NullBus);
        let err = LegacyIndexAdapter::new(&mut editor)
            .move_element("page-1", "bin-1", 7, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
