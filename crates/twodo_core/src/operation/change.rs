//! Field-level edit records.
//!
//! A `Change` sets one item field to a JSON value and remembers the previous
//! value, so metadata edits share the undo history with structural
//! operations without needing a dedicated operation type per field.

use crate::model::item::{Item, ItemId, ItemType, Recurrence};
use crate::operation::error::{OperationError, OperationResult};
use crate::operation::now_epoch_ms;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Editable item field addressed by a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Text,
    Type,
    Completed,
    Deadline,
    Progress,
    Recurrence,
    Color,
}

impl ItemField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Type => "type",
            Self::Completed => "completed",
            Self::Deadline => "deadline",
            Self::Progress => "progress",
            Self::Recurrence => "recurrence",
            Self::Color => "color",
        }
    }
}

/// One recorded field edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub item_id: ItemId,
    pub field: ItemField,
    pub value: Value,
    /// Filled in when the change is applied.
    #[serde(default)]
    pub old_value: Value,
    pub timestamp: i64,
}

impl Change {
    pub fn new(item_id: ItemId, field: ItemField, value: Value) -> Self {
        Self {
            item_id,
            field,
            value,
            old_value: Value::Null,
            timestamp: now_epoch_ms(),
        }
    }

    /// Change that restores the previous value.
    pub fn inverse(&self) -> Change {
        Change {
            item_id: self.item_id.clone(),
            field: self.field,
            value: self.old_value.clone(),
            old_value: self.value.clone(),
            timestamp: now_epoch_ms(),
        }
    }

    /// Current value of `field` on `item`, as JSON.
    pub(crate) fn read_field(item: &Item, field: ItemField) -> Value {
        let metadata = &item.metadata;
        match field {
            ItemField::Text => Value::String(item.text.clone()),
            ItemField::Type => Value::String(item.kind.as_str().to_string()),
            ItemField::Completed => metadata.completed.map(Value::Bool).unwrap_or(Value::Null),
            ItemField::Deadline => metadata.deadline.map(Value::from).unwrap_or(Value::Null),
            ItemField::Progress => metadata.progress.map(Value::from).unwrap_or(Value::Null),
            ItemField::Recurrence => metadata
                .recurrence
                .as_ref()
                .and_then(|recurrence| serde_json::to_value(recurrence).ok())
                .unwrap_or(Value::Null),
            ItemField::Color => metadata
                .color
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        }
    }

    /// Writes `self.value` into `item`. `null` clears optional fields.
    ///
    /// # Errors
    /// - `InvalidParams` when the value does not fit the field type.
    pub(crate) fn write_field(&self, item: &mut Item) -> OperationResult<()> {
        let value = &self.value;
        let mismatch = |expected: &str| {
            OperationError::invalid(
                "value",
                format!("expected {expected} for field `{}`", self.field.as_str()),
            )
        };
        match self.field {
            ItemField::Text => {
                item.text = value.as_str().ok_or_else(|| mismatch("string"))?.to_string();
            }
            ItemField::Type => {
                let name = value.as_str().ok_or_else(|| mismatch("item type name"))?;
                item.kind = ItemType::parse(name).ok_or_else(|| mismatch("item type name"))?;
            }
            ItemField::Completed => {
                item.metadata.completed = match value {
                    Value::Null => None,
                    other => Some(other.as_bool().ok_or_else(|| mismatch("bool or null"))?),
                };
            }
            ItemField::Deadline => {
                item.metadata.deadline = match value {
                    Value::Null => None,
                    other => Some(other.as_i64().ok_or_else(|| mismatch("epoch ms or null"))?),
                };
            }
            ItemField::Progress => {
                item.metadata.progress = match value {
                    Value::Null => None,
                    other => Some(
                        other
                            .as_u64()
                            .and_then(|raw| u8::try_from(raw).ok())
                            .ok_or_else(|| mismatch("integer 0..=100 or null"))?,
                    ),
                };
            }
            ItemField::Recurrence => {
                item.metadata.recurrence = match value {
                    Value::Null => None,
                    other => Some(
                        serde_json::from_value::<Recurrence>(other.clone())
                            .map_err(|_| mismatch("recurrence object or null"))?,
                    ),
                };
            }
            ItemField::Color => {
                item.metadata.color = match value {
                    Value::Null => None,
                    other => Some(
                        other
                            .as_str()
                            .ok_or_else(|| mismatch("string or null"))?
                            .to_string(),
                    ),
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Change, ItemField};
    use crate::model::item::{Item, ItemType};
    use serde_json::{json, Value};

    #[test]
    fn write_then_read_progress() {
        let mut item = Item::new("a1".into(), ItemType::Task, "x");
        let change = Change::new("a1".into(), ItemField::Progress, json!(40));
        change.write_field(&mut item).unwrap();
        assert_eq!(item.metadata.progress, Some(40));
        assert_eq!(Change::read_field(&item, ItemField::Progress), json!(40));
    }

    #[test]
    fn null_clears_optional_field() {
        let mut item = Item::new("a1".into(), ItemType::Task, "x");
        item.metadata.color = Some("red".to_string());
        Change::new("a1".into(), ItemField::Color, Value::Null)
            .write_field(&mut item)
            .unwrap();
        assert_eq!(item.metadata.color, None);
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let mut item = Item::new("a1".into(), ItemType::Task, "x");
        let err = Change::new("a1".into(), ItemField::Completed, json!("yes"))
            .write_field(&mut item)
            .unwrap_err();
        assert!(err.to_string().contains("completed"));
    }
}
