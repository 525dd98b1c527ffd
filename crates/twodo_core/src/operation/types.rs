//! Invertible mutation descriptors.
//!
//! # Responsibility
//! - Describe each tree mutation as a tagged value with its own inverse.
//! - Carry the captured pre-mutation state needed to undo destructive edits.
//!
//! # Invariants
//! - `inverse()` of a committed operation undoes it exactly.
//! - Captured items are deep copies, never references into the live store.

use crate::model::document::GroupRef;
use crate::model::item::{Item, ItemId, ItemMetadata, ItemType};
use crate::operation::error::{OperationError, OperationResult};
use crate::operation::now_epoch_ms;
use serde::{Deserialize, Serialize};

/// Operation type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    SetText,
    Move,
    Reparent,
    Split,
    Merge,
    Create,
    Delete,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetText => "set_text",
            Self::Move => "move",
            Self::Reparent => "reparent",
            Self::Split => "split",
            Self::Merge => "merge",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value.trim() {
            "set_text" | "setText" => Self::SetText,
            "move" => Self::Move,
            "reparent" => Self::Reparent,
            "split" => Self::Split,
            "merge" => Self::Merge,
            "create" => Self::Create,
            "delete" => Self::Delete,
            _ => return None,
        };
        Some(kind)
    }
}

/// Content of a newly created item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemData {
    pub text: String,
    pub metadata: ItemMetadata,
}

/// Flat position one item of a moved block occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatSlot {
    pub item_id: ItemId,
    pub flat_index: usize,
}

/// Deep copy of one item plus the flat slot it occupied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedItem {
    pub flat_index: usize,
    pub item: Item,
}

/// Deep copy of a removed subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedSubtree {
    pub root: CapturedItem,
    #[serde(default)]
    pub descendants: Vec<CapturedItem>,
    pub parent_id: Option<ItemId>,
    /// Root index when `parent_id` is `None`, child-list index otherwise.
    pub index: usize,
    pub group: GroupRef,
}

impl CapturedSubtree {
    /// All captured items ordered by their former flat position.
    pub fn items_in_flat_order(&self) -> Vec<&CapturedItem> {
        let mut items: Vec<&CapturedItem> = std::iter::once(&self.root)
            .chain(self.descendants.iter())
            .collect();
        items.sort_by_key(|captured| captured.flat_index);
        items
    }
}

/// State captured when a merge is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCapture {
    /// Character length of the previous item's text before the merge.
    pub caret_position: usize,
    pub merged: CapturedItem,
}

/// Type-specific operation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationParams {
    SetText {
        new_text: String,
        old_text: String,
    },
    Move {
        new_parent_id: Option<ItemId>,
        new_index: usize,
        old_parent_id: Option<ItemId>,
        old_index: usize,
        /// Where the moved block lands in flat order. Empty means derive it
        /// from `new_parent_id` and `new_index`.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        new_slots: Vec<FlatSlot>,
        /// Where the block sat before the move; filled in on apply.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        old_slots: Vec<FlatSlot>,
    },
    Reparent {
        new_parent_id: Option<ItemId>,
        new_depth: usize,
        old_parent_id: Option<ItemId>,
        old_depth: usize,
        /// Slot in the new parent's child list; appended when `None`.
        #[serde(default)]
        new_child_index: Option<usize>,
        #[serde(default)]
        old_child_index: Option<usize>,
    },
    Split {
        /// Character (not byte) offset into the item text.
        caret_position: usize,
        new_item_id: ItemId,
        /// Item to bring back when this split undoes a merge.
        #[serde(default)]
        restore: Option<CapturedItem>,
    },
    Merge {
        previous_item_id: ItemId,
        #[serde(default)]
        captured: Option<MergeCapture>,
    },
    Create {
        item_type: ItemType,
        parent_id: Option<ItemId>,
        index: usize,
        #[serde(default)]
        item_data: ItemData,
        /// Group for root items. Defaults to the parent's group, then to the
        /// first group of the store.
        #[serde(default)]
        group: Option<GroupRef>,
        /// Subtree to bring back when this create undoes a delete.
        #[serde(default)]
        restore: Option<CapturedSubtree>,
    },
    Delete {
        #[serde(default)]
        deleted_item: Option<CapturedSubtree>,
    },
}

impl OperationParams {
    pub fn kind(&self) -> OperationType {
        match self {
            Self::SetText { .. } => OperationType::SetText,
            Self::Move { .. } => OperationType::Move,
            Self::Reparent { .. } => OperationType::Reparent,
            Self::Split { .. } => OperationType::Split,
            Self::Merge { .. } => OperationType::Merge,
            Self::Create { .. } => OperationType::Create,
            Self::Delete { .. } => OperationType::Delete,
        }
    }
}

/// One tagged, invertible tree mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub item_id: ItemId,
    pub params: OperationParams,
    /// Unix epoch milliseconds at construction.
    pub timestamp: i64,
}

impl Operation {
    pub fn new(item_id: ItemId, params: OperationParams) -> Self {
        Self {
            item_id,
            params,
            timestamp: now_epoch_ms(),
        }
    }

    pub fn kind(&self) -> OperationType {
        self.params.kind()
    }

    pub fn set_text(
        item_id: ItemId,
        new_text: impl Into<String>,
        old_text: impl Into<String>,
    ) -> Self {
        Self::new(
            item_id,
            OperationParams::SetText {
                new_text: new_text.into(),
                old_text: old_text.into(),
            },
        )
    }

    /// Move with unknown old position; the manager captures it on apply.
    pub fn move_item(item_id: ItemId, new_parent_id: Option<ItemId>, new_index: usize) -> Self {
        Self::new(
            item_id,
            OperationParams::Move {
                new_parent_id,
                new_index,
                old_parent_id: None,
                old_index: 0,
                new_slots: Vec::new(),
                old_slots: Vec::new(),
            },
        )
    }

    /// Promote (`None`) or demote under `new_parent_id` without moving the
    /// item in flat order.
    ///
    /// `new_depth` is the depth the item will have: 0 when promoting, the
    /// parent's depth plus one otherwise. The manager refuses a mismatch.
    pub fn reparent(item_id: ItemId, new_parent_id: Option<ItemId>, new_depth: usize) -> Self {
        Self::new(
            item_id,
            OperationParams::Reparent {
                new_parent_id,
                new_depth,
                old_parent_id: None,
                old_depth: 0,
                new_child_index: None,
                old_child_index: None,
            },
        )
    }

    pub fn split(item_id: ItemId, caret_position: usize, new_item_id: ItemId) -> Self {
        Self::new(
            item_id,
            OperationParams::Split {
                caret_position,
                new_item_id,
                restore: None,
            },
        )
    }

    pub fn merge(item_id: ItemId, previous_item_id: ItemId) -> Self {
        Self::new(
            item_id,
            OperationParams::Merge {
                previous_item_id,
                captured: None,
            },
        )
    }

    pub fn create(
        item_id: ItemId,
        item_type: ItemType,
        parent_id: Option<ItemId>,
        index: usize,
        item_data: ItemData,
    ) -> Self {
        Self::new(
            item_id,
            OperationParams::Create {
                item_type,
                parent_id,
                index,
                item_data,
                group: None,
                restore: None,
            },
        )
    }

    /// Same as [`Operation::create`] with an explicit target group.
    pub fn create_in(
        group: GroupRef,
        item_id: ItemId,
        item_type: ItemType,
        index: usize,
        item_data: ItemData,
    ) -> Self {
        Self::new(
            item_id,
            OperationParams::Create {
                item_type,
                parent_id: None,
                index,
                item_data,
                group: Some(group),
                restore: None,
            },
        )
    }

    pub fn delete(item_id: ItemId) -> Self {
        Self::new(item_id, OperationParams::Delete { deleted_item: None })
    }

    /// Builds the operation that undoes this one.
    ///
    /// # Errors
    /// - `InvalidParams` for a merge or delete that carries no captured state,
    ///   which only happens for operations that were never applied.
    pub fn inverse(&self) -> OperationResult<Operation> {
        let (item_id, params) = match &self.params {
            OperationParams::SetText { new_text, old_text } => (
                self.item_id.clone(),
                OperationParams::SetText {
                    new_text: old_text.clone(),
                    old_text: new_text.clone(),
                },
            ),
            OperationParams::Move {
                new_parent_id,
                new_index,
                old_parent_id,
                old_index,
                new_slots,
                old_slots,
            } => (
                self.item_id.clone(),
                OperationParams::Move {
                    new_parent_id: old_parent_id.clone(),
                    new_index: *old_index,
                    old_parent_id: new_parent_id.clone(),
                    old_index: *new_index,
                    new_slots: old_slots.clone(),
                    old_slots: new_slots.clone(),
                },
            ),
            OperationParams::Reparent {
                new_parent_id,
                new_depth,
                old_parent_id,
                old_depth,
                new_child_index,
                old_child_index,
            } => (
                self.item_id.clone(),
                OperationParams::Reparent {
                    new_parent_id: old_parent_id.clone(),
                    new_depth: *old_depth,
                    old_parent_id: new_parent_id.clone(),
                    old_depth: *new_depth,
                    new_child_index: *old_child_index,
                    old_child_index: *new_child_index,
                },
            ),
            OperationParams::Split { new_item_id, .. } => (
                new_item_id.clone(),
                OperationParams::Merge {
                    previous_item_id: self.item_id.clone(),
                    captured: None,
                },
            ),
            OperationParams::Merge {
                previous_item_id,
                captured,
            } => {
                let captured = captured.as_ref().ok_or_else(|| {
                    OperationError::invalid("captured", "merge has not been applied")
                })?;
                (
                    previous_item_id.clone(),
                    OperationParams::Split {
                        caret_position: captured.caret_position,
                        new_item_id: self.item_id.clone(),
                        restore: Some(captured.merged.clone()),
                    },
                )
            }
            OperationParams::Create { .. } => (
                self.item_id.clone(),
                OperationParams::Delete { deleted_item: None },
            ),
            OperationParams::Delete { deleted_item } => {
                let subtree = deleted_item.as_ref().ok_or_else(|| {
                    OperationError::invalid("deleted_item", "delete has not been applied")
                })?;
                let root = &subtree.root.item;
                (
                    self.item_id.clone(),
                    OperationParams::Create {
                        item_type: root.kind,
                        parent_id: subtree.parent_id.clone(),
                        index: subtree.index,
                        item_data: ItemData {
                            text: root.text.clone(),
                            metadata: root.metadata.clone(),
                        },
                        group: Some(subtree.group.clone()),
                        restore: Some(subtree.clone()),
                    },
                )
            }
        };
        Ok(Operation::new(item_id, params))
    }

    /// Ids this operation needs to resolve when applied forward.
    ///
    /// Returns `(must_exist, must_be_absent)`.
    pub fn forward_requirements(&self) -> (Vec<ItemId>, Vec<ItemId>) {
        let target = self.item_id.clone();
        match &self.params {
            OperationParams::SetText { .. } | OperationParams::Delete { .. } => {
                (vec![target], Vec::new())
            }
            OperationParams::Move { new_parent_id, .. }
            | OperationParams::Reparent { new_parent_id, .. } => {
                let mut present = vec![target];
                present.extend(new_parent_id.iter().cloned());
                (present, Vec::new())
            }
            OperationParams::Split { new_item_id, .. } => (vec![target], vec![new_item_id.clone()]),
            OperationParams::Merge {
                previous_item_id, ..
            } => (vec![target, previous_item_id.clone()], Vec::new()),
            OperationParams::Create { parent_id, .. } => {
                (parent_id.iter().cloned().collect(), vec![target])
            }
        }
    }
}
