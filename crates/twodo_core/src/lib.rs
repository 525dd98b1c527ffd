//! Core outline model for twodo.
//! This crate owns every structural invariant of the item tree; hosts only
//! lend it their store and listen to its signals.

pub mod config;
pub mod hierarchy;
pub mod history;
pub mod legacy;
pub mod logging;
pub mod model;
pub mod operation;
pub mod service;
pub mod signal;

pub use config::{ConfigError, EditorConfig, LoggingConfig};
pub use history::{
    diagnose_undo_issue, diff_against_snapshot, validate_state, History, HistoryEntry,
    HistoryStep, SnapshotDiff, StateReport, UndoDiagnosis, UndoIssue, UndoIssueKind,
};
pub use legacy::{LegacyIndexAdapter, LegacyPosition};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{Document, Group, GroupRef, ItemLocation, Store};
pub use model::item::{
    Item, ItemId, ItemMetadata, ItemType, ItemValidationError, Recurrence, RecurrenceFrequency,
};
pub use operation::{
    create_operation, Change, ErrorKind, InvariantReason, ItemData, ItemField, Operation,
    OperationError, OperationManager, OperationParams, OperationResult, OperationType,
};
pub use service::{ApplyOutcome, Editor};
pub use signal::{
    BatchSubscriber, NullBus, Persistence, PersistenceSubscriber, RecordingBus, Signal,
    SignalBatch, SignalBatcher, SignalBus, SignalType,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
