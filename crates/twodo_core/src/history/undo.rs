//! Linear undo/redo stacks.
//!
//! # Responsibility
//! - Record committed operations and changes in application order.
//! - Undo by applying inverses, redo by re-applying forward entries.
//!
//! # Invariants
//! - Recording a new entry clears the redo stack.
//! - A rejected undo/redo leaves both stacks and the store as they were.
//! - Entries kept on either stack always carry state captured on their last
//!   application, so inverses stay exact across repeated undo/redo.

use crate::config::EditorConfig;
use crate::history::snapshot::{Snapshot, SnapshotLog};
use crate::model::document::Store;
use crate::model::item::ItemId;
use crate::operation::change::Change;
use crate::operation::error::{OperationError, OperationResult};
use crate::operation::manager::OperationManager;
use crate::operation::types::Operation;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One recorded undo step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum HistoryEntry {
    Operation(Operation),
    Change(Change),
}

impl HistoryEntry {
    pub fn item_id(&self) -> &ItemId {
        match self {
            Self::Operation(operation) => &operation.item_id,
            Self::Change(change) => &change.item_id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Operation(operation) => operation.kind().as_str(),
            Self::Change(change) => change.field.as_str(),
        }
    }
}

/// Direction of a history step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    Undo,
    Redo,
}

/// What one undo/redo actually did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStep {
    pub direction: StepDirection,
    /// The entry as applied: the committed inverse for undo, the committed
    /// forward entry for redo.
    pub applied: HistoryEntry,
}

/// Undo/redo stacks plus periodic snapshots.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    snapshots: SnapshotLog,
    max_history: usize,
    recorded: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl History {
    pub fn new(max_history: usize, snapshot_interval: usize, max_snapshots: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            snapshots: SnapshotLog::new(snapshot_interval, max_snapshots),
            max_history: max_history.max(1),
            recorded: 0,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(
            config.max_history,
            config.snapshot_interval,
            config.max_snapshots,
        )
    }

    /// Records a committed operation. `store` is the state right after it.
    pub fn record_operation(&mut self, operation: Operation, store: &Store) {
        self.record(HistoryEntry::Operation(operation), store);
    }

    /// Records an applied change. `store` is the state right after it.
    pub fn record_change(&mut self, change: Change, store: &Store) {
        self.record(HistoryEntry::Change(change), store);
    }

    fn record(&mut self, entry: HistoryEntry, store: &Store) {
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_history {
            let overflow = self.undo_stack.len() - self.max_history;
            self.undo_stack.drain(..overflow);
        }
        self.recorded += 1;
        if self.snapshots.is_due(self.recorded) {
            self.snapshots.capture(self.recorded, store);
        }
    }

    /// Undoes the newest entry.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    ///
    /// # Errors
    /// - `StateDesync` when the inverse no longer applies; the entry stays on
    ///   the undo stack and the store is unchanged.
    pub fn undo(
        &mut self,
        store: &mut Store,
        manager: &OperationManager,
    ) -> OperationResult<Option<HistoryStep>> {
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };
        match apply_inverse(&entry, store, manager) {
            Ok(applied) => {
                info!(
                    "event=history_undo module=history status=ok entry={} item={}",
                    entry.label(),
                    entry.item_id()
                );
                self.redo_stack.push(entry);
                Ok(Some(HistoryStep {
                    direction: StepDirection::Undo,
                    applied,
                }))
            }
            Err(err) => {
                let desync = desync_error(&entry, StepDirection::Undo, &err);
                warn!(
                    "event=history_undo module=history status=desync entry={} item={} error={}",
                    entry.label(),
                    entry.item_id(),
                    err
                );
                self.undo_stack.push(entry);
                Err(desync)
            }
        }
    }

    /// Re-applies the newest undone entry.
    ///
    /// Returns `Ok(None)` when there is nothing to redo.
    ///
    /// # Errors
    /// - `StateDesync` when the entry no longer applies; it stays on the redo
    ///   stack and the store is unchanged.
    pub fn redo(
        &mut self,
        store: &mut Store,
        manager: &OperationManager,
    ) -> OperationResult<Option<HistoryStep>> {
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        match apply_forward(&entry, store, manager) {
            Ok(applied) => {
                info!(
                    "event=history_redo module=history status=ok entry={} item={}",
                    entry.label(),
                    entry.item_id()
                );
                self.undo_stack.push(applied.clone());
                Ok(Some(HistoryStep {
                    direction: StepDirection::Redo,
                    applied,
                }))
            }
            Err(err) => {
                let desync = desync_error(&entry, StepDirection::Redo, &err);
                warn!(
                    "event=history_redo module=history status=desync entry={} item={} error={}",
                    entry.label(),
                    entry.item_id(),
                    err
                );
                self.redo_stack.push(entry);
                Err(desync)
            }
        }
    }

    /// Captures a snapshot outside the periodic schedule.
    pub fn take_snapshot(&mut self, store: &Store) -> &Snapshot {
        self.snapshots.capture(self.recorded, store)
    }

    /// Replaces `store` with the newest snapshot and drops both stacks,
    /// since their entries were captured against later states.
    ///
    /// Returns the snapshot's change index, or `None` when none was taken.
    pub fn restore_latest_snapshot(&mut self, store: &mut Store) -> Option<u64> {
        let snapshot = self.snapshots.latest()?;
        let change_index = snapshot.change_index;
        *store = snapshot.state.clone();
        self.clear();
        info!(
            "event=snapshot_restore module=history status=ok change_index={}",
            change_index
        );
        Some(change_index)
    }

    pub fn snapshots(&self) -> &SnapshotLog {
        &self.snapshots
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Oldest first.
    pub fn undo_entries(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    /// Oldest first; the next redo is the last element.
    pub fn redo_entries(&self) -> &[HistoryEntry] {
        &self.redo_stack
    }

    /// Total entries recorded since creation, including evicted ones.
    pub fn recorded_count(&self) -> u64 {
        self.recorded
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

pub(crate) fn apply_inverse(
    entry: &HistoryEntry,
    store: &mut Store,
    manager: &OperationManager,
) -> OperationResult<HistoryEntry> {
    match entry {
        HistoryEntry::Operation(operation) => {
            let inverse = operation.inverse()?;
            manager
                .apply(store, &inverse)
                .map(HistoryEntry::Operation)
        }
        HistoryEntry::Change(change) => manager
            .apply_change(store, &change.inverse())
            .map(HistoryEntry::Change),
    }
}

pub(crate) fn apply_forward(
    entry: &HistoryEntry,
    store: &mut Store,
    manager: &OperationManager,
) -> OperationResult<HistoryEntry> {
    match entry {
        HistoryEntry::Operation(operation) => manager
            .apply(store, operation)
            .map(HistoryEntry::Operation),
        HistoryEntry::Change(change) => manager
            .apply_change(store, change)
            .map(HistoryEntry::Change),
    }
}

fn desync_error(
    entry: &HistoryEntry,
    direction: StepDirection,
    cause: &OperationError,
) -> OperationError {
    let verb = match direction {
        StepDirection::Undo => "undo",
        StepDirection::Redo => "redo",
    };
    OperationError::desync(
        entry.item_id(),
        format!("{verb} of {} rejected: {cause}", entry.label()),
    )
}
