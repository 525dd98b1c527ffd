//! Invertible operations over the item tree.
//!
//! # Responsibility
//! - Define the operation and change records kept in undo history.
//! - Validate loosely typed params into operations.
//! - Apply operations to a store without breaking structural invariants.
//!
//! # Invariants
//! - Operations address items by stable id only; flat indices are resolved
//!   against the live store on every apply.

pub mod change;
pub mod error;
pub mod manager;
pub mod params;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

pub use change::{Change, ItemField};
pub use error::{ErrorKind, InvariantReason, OperationError, OperationResult};
pub use manager::OperationManager;
pub use params::create_operation;
pub use types::{
    CapturedItem, CapturedSubtree, FlatSlot, ItemData, MergeCapture, Operation,
    OperationParams, OperationType,
};

/// Current Unix time in milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
