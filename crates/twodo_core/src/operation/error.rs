//! Operation error contracts.

use crate::model::item::ItemId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by operation construction and application.
pub type OperationResult<T> = Result<T, OperationError>;

/// Which structural rule a rejected mutation would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantReason {
    /// Item would become its own parent.
    SelfNest,
    /// Item would end up below one of its own descendants.
    Cycle,
    /// Resulting depth would exceed the configured nesting limit.
    NestingDepth,
    /// An item with the same id already exists in the document.
    DuplicateId,
    /// Merge target is not the immediately preceding sibling.
    NotSibling,
}

impl InvariantReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfNest => "self-nest",
            Self::Cycle => "cycle",
            Self::NestingDepth => "nesting-depth",
            Self::DuplicateId => "duplicate-id",
            Self::NotSibling => "not-sibling",
        }
    }
}

/// Coarse error category exposed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvariantViolation,
    InvalidOperationParams,
    StateDesync,
}

/// Errors from operation construction, application and history replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Target item is absent from every document.
    ItemNotFound(ItemId),
    /// Referenced parent is absent from the target's group.
    ParentNotFound(ItemId),
    /// Addressed document/group does not exist.
    GroupNotFound {
        document_id: String,
        group_id: String,
    },
    /// Legacy caller addressed a flat or child index past the end.
    IndexOutOfRange { index: usize, len: usize },
    /// Mutation refused because it would break a structural invariant.
    InvariantViolation {
        item_id: ItemId,
        reason: InvariantReason,
    },
    /// Operation could not be constructed from the supplied params.
    InvalidParams { field: String, message: String },
    /// Live state no longer matches what a history entry expects.
    StateDesync { item_id: ItemId, message: String },
}

impl OperationError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn violation(item_id: &ItemId, reason: InvariantReason) -> Self {
        Self::InvariantViolation {
            item_id: item_id.clone(),
            reason,
        }
    }

    pub(crate) fn desync(item_id: &ItemId, message: impl Into<String>) -> Self {
        Self::StateDesync {
            item_id: item_id.clone(),
            message: message.into(),
        }
    }

    /// Collaborator-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ItemNotFound(_)
            | Self::ParentNotFound(_)
            | Self::GroupNotFound { .. }
            | Self::IndexOutOfRange { .. } => ErrorKind::NotFound,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::InvalidParams { .. } => ErrorKind::InvalidOperationParams,
            Self::StateDesync { .. } => ErrorKind::StateDesync,
        }
    }

    /// Invariant reason when this is a violation.
    pub fn reason(&self) -> Option<InvariantReason> {
        match self {
            Self::InvariantViolation { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl Display for OperationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent item not found: {id}"),
            Self::GroupNotFound {
                document_id,
                group_id,
            } => write!(f, "group not found: {document_id}/{group_id}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::InvariantViolation { item_id, reason } => write!(
                f,
                "invariant violation ({}) for item {item_id}",
                reason.as_str()
            ),
            Self::InvalidParams { field, message } => {
                write!(f, "invalid operation params: `{field}` {message}")
            }
            Self::StateDesync { item_id, message } => {
                write!(f, "state desync for item {item_id}: {message}")
            }
        }
    }
}

impl Error for OperationError {}
