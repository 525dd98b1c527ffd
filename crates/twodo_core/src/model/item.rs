//! Item domain model.
//!
//! # Responsibility
//! - Define the atomic content unit stored in a group's flat item list.
//! - Keep optional per-type metadata in one closed, validated shape.
//!
//! # Invariants
//! - `id` is stable and never reused for another item in the same document.
//! - `parent_id` is a lookup-only back reference; `child_ids` owns the edge.
//! - `progress` stays within `0..=100` and recurrence intervals are positive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static ITEM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:\-]+$").expect("valid item id regex"));

/// Stable item identifier.
///
/// Wraps the external string id so callers cannot mix it up with document or
/// group ids in signatures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Parses an externally supplied id.
    pub fn parse(value: impl Into<String>) -> Result<Self, ItemValidationError> {
        let value = value.into();
        if !ITEM_ID_RE.is_match(&value) {
            return Err(ItemValidationError::InvalidId(value));
        }
        Ok(Self(value))
    }

    /// Generates a fresh id for items created inside the core.
    pub fn generate() -> Self {
        Self(format!("item-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    /// Unchecked conversion used by fixtures and literals.
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Closed set of item kinds rendered by the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Task,
    Text,
    Header,
    Note,
    Checkbox,
    Image,
    Audio,
    Counter,
    Tracker,
    Rating,
    Timer,
    TimeLog,
    Calendar,
    Divider,
}

impl ItemType {
    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Text => "text",
            Self::Header => "header",
            Self::Note => "note",
            Self::Checkbox => "checkbox",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Counter => "counter",
            Self::Tracker => "tracker",
            Self::Rating => "rating",
            Self::Timer => "timer",
            Self::TimeLog => "time-log",
            Self::Calendar => "calendar",
            Self::Divider => "divider",
        }
    }

    /// Parses a wire name, returning `None` for unknown kinds.
    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value.trim() {
            "task" => Self::Task,
            "text" => Self::Text,
            "header" => Self::Header,
            "note" => Self::Note,
            "checkbox" => Self::Checkbox,
            "image" => Self::Image,
            "audio" => Self::Audio,
            "counter" => Self::Counter,
            "tracker" => Self::Tracker,
            "rating" => Self::Rating,
            "timer" => Self::Timer,
            "time-log" => Self::TimeLog,
            "calendar" => Self::Calendar,
            "divider" => Self::Divider,
            _ => return None,
        };
        Some(kind)
    }
}

/// Repeat cadence for recurring tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Recurrence rule attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    /// Must be at least 1.
    pub interval: u32,
}

/// Optional per-item properties.
///
/// Every field is explicitly optional so appliers and validators can match
/// the whole shape exhaustively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Unix epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
    /// Percentage in `0..=100`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Validation errors for item shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Id is empty or contains characters outside `[A-Za-z0-9_.:-]`.
    InvalidId(String),
    /// `progress` is above 100.
    ProgressOutOfRange(u8),
    /// Recurrence interval of zero.
    ZeroRecurrenceInterval,
    /// Item lists itself as a child.
    SelfReference(ItemId),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => write!(f, "invalid item id `{value}`"),
            Self::ProgressOutOfRange(value) => {
                write!(f, "progress must be within 0..=100, got {value}")
            }
            Self::ZeroRecurrenceInterval => write!(f, "recurrence interval must be at least 1"),
            Self::SelfReference(id) => write!(f, "item {id} lists itself as a child"),
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical outline item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Serialized as `type` to match the collaborator wire shape.
    #[serde(rename = "type")]
    pub kind: ItemType,
    pub text: String,
    #[serde(default)]
    pub metadata: ItemMetadata,
    /// `None` means root item of its group.
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub child_ids: Vec<ItemId>,
}

impl Item {
    /// Creates a root item with empty metadata.
    pub fn new(id: ItemId, kind: ItemType, text: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            text: text.into(),
            metadata: ItemMetadata::default(),
            parent_id: None,
            child_ids: Vec::new(),
        }
    }

    /// Creates a child item pointing at `parent_id`.
    ///
    /// Only sets the back reference; the parent's `child_ids` must be updated
    /// by the caller.
    pub fn child_of(
        id: ItemId,
        parent_id: ItemId,
        kind: ItemType,
        text: impl Into<String>,
    ) -> Self {
        let mut item = Self::new(id, kind, text);
        item.parent_id = Some(parent_id);
        item
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }

    /// Validates item-local shape. Cross-item invariants are checked by the
    /// history diagnostics.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if !ITEM_ID_RE.is_match(self.id.as_str()) {
            return Err(ItemValidationError::InvalidId(self.id.0.clone()));
        }
        if let Some(progress) = self.metadata.progress {
            if progress > 100 {
                return Err(ItemValidationError::ProgressOutOfRange(progress));
            }
        }
        if let Some(recurrence) = &self.metadata.recurrence {
            if recurrence.interval == 0 {
                return Err(ItemValidationError::ZeroRecurrenceInterval);
            }
        }
        if self.child_ids.contains(&self.id) {
            return Err(ItemValidationError::SelfReference(self.id.clone()));
        }
        Ok(())
    }
}
