//! Editor facade.
//!
//! # Responsibility
//! - Tie the borrowed store, operation manager, history and signal bus into
//!   the single entry point collaborators call.
//! - Record every committed mutation and publish its signals.
//!
//! # Invariants
//! - Only committed mutations are recorded or signalled.
//! - Signals are published after the store is already consistent.

use crate::config::{ConfigError, EditorConfig};
use crate::history::diagnostics::{self, SnapshotDiff, StateReport, UndoDiagnosis};
use crate::history::snapshot::Snapshot;
use crate::history::undo::{History, HistoryEntry, HistoryStep};
use crate::model::document::{ItemLocation, Store};
use crate::model::item::ItemId;
use crate::operation::change::Change;
use crate::operation::error::{ErrorKind, OperationResult};
use crate::operation::manager::OperationManager;
use crate::operation::params;
use crate::operation::types::{Operation, OperationParams, OperationType};
use crate::signal::{Signal, SignalBus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collaborator-facing result of [`Editor::apply_operation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApplyOutcome {
    fn from_result<T>(result: &OperationResult<T>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                error: None,
                message: None,
            },
            Err(err) => Self {
                success: false,
                error: Some(err.kind()),
                message: Some(err.to_string()),
            },
        }
    }
}

/// Editing session over a host-owned store.
pub struct Editor<'s, B: SignalBus> {
    store: &'s mut Store,
    manager: OperationManager,
    history: History,
    bus: B,
    config: EditorConfig,
}

impl<'s, B: SignalBus> Editor<'s, B> {
    /// Creates an editor with default limits.
    pub fn new(store: &'s mut Store, bus: B) -> Self {
        let config = EditorConfig::default();
        Self {
            store,
            manager: OperationManager::from_config(&config),
            history: History::from_config(&config),
            bus,
            config,
        }
    }

    /// Creates an editor with validated custom limits.
    ///
    /// # Errors
    /// - `ConfigError::Invalid` when a limit is zero.
    pub fn with_config(
        store: &'s mut Store,
        bus: B,
        config: EditorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            manager: OperationManager::from_config(&config),
            history: History::from_config(&config),
            bus,
            config,
        })
    }

    pub fn store(&self) -> &Store {
        &*self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Validates loosely typed params into an operation.
    ///
    /// # Errors
    /// - `InvalidParams` naming the first offending field.
    pub fn create_operation(
        &self,
        kind: OperationType,
        item_id: &str,
        params: &Value,
    ) -> OperationResult<Operation> {
        params::create_operation(kind, item_id, params)
    }

    /// Applies, records and signals `operation`.
    ///
    /// # Errors
    /// - Any `OperationError`; the store is unchanged on error.
    pub fn try_apply(&mut self, operation: &Operation) -> OperationResult<Operation> {
        let committed = self.manager.apply(self.store, operation)?;
        self.history.record_operation(committed.clone(), self.store);
        for signal in operation_signals(&committed) {
            self.bus.publish(signal);
        }
        self.publish_commit();
        Ok(committed)
    }

    /// [`Editor::try_apply`] reduced to a success flag and error kind.
    pub fn apply_operation(&mut self, operation: &Operation) -> ApplyOutcome {
        ApplyOutcome::from_result(&self.try_apply(operation))
    }

    /// Applies, records and signals a field-level change.
    ///
    /// # Errors
    /// - `ItemNotFound` or `InvalidParams`; the store is unchanged on error.
    pub fn apply_change(&mut self, change: &Change) -> OperationResult<Change> {
        let committed = self.manager.apply_change(self.store, change)?;
        self.history.record_change(committed.clone(), self.store);
        self.bus.publish(Signal::ElementUpdated(committed.item_id.clone()));
        self.publish_commit();
        Ok(committed)
    }

    pub fn find_item(&self, item_id: &ItemId) -> Option<ItemLocation<'_>> {
        self.manager.find_item(self.store, item_id)
    }

    /// Undoes the newest entry; `Ok(None)` when there is nothing to undo.
    ///
    /// # Errors
    /// - `StateDesync` when the inverse no longer applies.
    pub fn undo(&mut self) -> OperationResult<Option<HistoryStep>> {
        let step = self.history.undo(self.store, &self.manager)?;
        self.publish_step(step.as_ref());
        Ok(step)
    }

    /// Re-applies the newest undone entry; `Ok(None)` when there is none.
    ///
    /// # Errors
    /// - `StateDesync` when the entry no longer applies.
    pub fn redo(&mut self) -> OperationResult<Option<HistoryStep>> {
        let step = self.history.redo(self.store, &self.manager)?;
        self.publish_step(step.as_ref());
        Ok(step)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn validate_state(&self) -> StateReport {
        diagnostics::validate_state(self.store, self.manager.max_depth())
    }

    pub fn diagnose_undo_issue(&self) -> UndoDiagnosis {
        diagnostics::diagnose_undo_issue(&self.history, self.store, &self.manager)
    }

    pub fn take_snapshot(&mut self) -> &Snapshot {
        self.history.take_snapshot(self.store)
    }

    /// What changed since the newest snapshot; `None` when none was taken.
    pub fn diff_against_latest_snapshot(&self) -> Option<SnapshotDiff> {
        let snapshot = self.history.snapshots().latest()?;
        Some(diagnostics::diff_against_snapshot(snapshot, self.store))
    }

    /// Rolls the store back to the newest snapshot, typically after
    /// [`Editor::diagnose_undo_issue`] reports a desync.
    ///
    /// Undo and redo history is discarded. Returns the snapshot's change
    /// index, or `None` (store untouched) when no snapshot exists.
    pub fn recover_to_latest_snapshot(&mut self) -> Option<u64> {
        let change_index = self.history.restore_latest_snapshot(self.store)?;
        self.bus.publish(Signal::RenderRequested);
        self.bus.publish(Signal::SaveRequested { immediate: true });
        Some(change_index)
    }

    fn publish_step(&mut self, step: Option<&HistoryStep>) {
        let Some(step) = step else {
            return;
        };
        match &step.applied {
            HistoryEntry::Operation(operation) => {
                for signal in operation_signals(operation) {
                    self.bus.publish(signal);
                }
            }
            HistoryEntry::Change(change) => {
                self.bus.publish(Signal::ElementUpdated(change.item_id.clone()));
            }
        }
        self.publish_commit();
    }

    fn publish_commit(&mut self) {
        self.bus.publish(Signal::RenderRequested);
        self.bus.publish(Signal::SaveRequested { immediate: false });
    }
}

/// Element signals for a committed operation.
fn operation_signals(operation: &Operation) -> Vec<Signal> {
    let item_id = operation.item_id.clone();
    match &operation.params {
        OperationParams::SetText { .. }
        | OperationParams::Move { .. }
        | OperationParams::Reparent { .. } => vec![Signal::ElementUpdated(item_id)],
        OperationParams::Split { new_item_id, .. } => vec![
            Signal::ElementUpdated(item_id),
            Signal::ElementCreated(new_item_id.clone()),
        ],
        OperationParams::Merge {
            previous_item_id, ..
        } => vec![
            Signal::ElementUpdated(previous_item_id.clone()),
            Signal::ElementDeleted(item_id),
        ],
        OperationParams::Create { restore, .. } => {
            let mut signals = vec![Signal::ElementCreated(item_id)];
            if let Some(subtree) = restore {
                signals.extend(
                    subtree
                        .descendants
                        .iter()
                        .map(|captured| Signal::ElementCreated(captured.item.id.clone())),
                );
            }
            signals
        }
        OperationParams::Delete { deleted_item } => {
            let mut signals = vec![Signal::ElementDeleted(item_id)];
            if let Some(subtree) = deleted_item {
                signals.extend(
                    subtree
                        .descendants
                        .iter()
                        .map(|captured| Signal::ElementDeleted(captured.item.id.clone())),
                );
            }
            signals
        }
    }
}
