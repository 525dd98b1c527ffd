//! Undo/redo history, snapshots and state diagnostics.

pub mod diagnostics;
pub mod snapshot;
pub mod undo;

pub use diagnostics::{
    diagnose_undo_issue, diff_against_snapshot, validate_state, SnapshotDiff, StackName,
    StateReport, UndoDiagnosis, UndoIssue, UndoIssueKind,
};
pub use snapshot::{Snapshot, SnapshotLog};
pub use undo::{History, HistoryEntry, HistoryStep, StepDirection};
