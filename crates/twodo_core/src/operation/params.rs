//! Operation construction from loosely typed collaborator params.
//!
//! # Responsibility
//! - Check that every required param for an operation type is present and
//!   well-typed before anything is constructed.
//!
//! # Invariants
//! - Construction never touches the store.
//! - Keys are read in snake_case, with the camelCase spelling accepted as an
//!   alias for UI callers.

use crate::model::document::GroupRef;
use crate::model::item::{ItemId, ItemType};
use crate::operation::error::{OperationError, OperationResult};
use crate::operation::types::{CapturedSubtree, ItemData, Operation, OperationParams, OperationType};
use serde_json::{Map, Value};

/// Validates `params` for `kind` and builds the operation.
///
/// # Errors
/// - `InvalidParams` naming the first missing or malformed field.
pub fn create_operation(
    kind: OperationType,
    item_id: &str,
    params: &Value,
) -> OperationResult<Operation> {
    let item_id = ItemId::parse(item_id)
        .map_err(|err| OperationError::invalid("item_id", err.to_string()))?;
    let params = params
        .as_object()
        .ok_or_else(|| OperationError::invalid("params", "must be an object"))?;

    let parsed = match kind {
        OperationType::SetText => OperationParams::SetText {
            new_text: required_string(params, "new_text")?,
            old_text: required_string(params, "old_text")?,
        },
        OperationType::Move => OperationParams::Move {
            new_parent_id: nullable_id(params, "new_parent_id")?,
            new_index: required_index(params, "new_index")?,
            old_parent_id: nullable_id(params, "old_parent_id")?,
            old_index: required_index(params, "old_index")?,
            new_slots: Vec::new(),
            old_slots: Vec::new(),
        },
        OperationType::Reparent => {
            let new_parent_id = nullable_id(params, "new_parent_id")?;
            let new_depth = required_index(params, "new_depth")?;
            let old_parent_id = nullable_id(params, "old_parent_id")?;
            let old_depth = required_index(params, "old_depth")?;
            if new_parent_id.is_none() && new_depth != 0 {
                return Err(OperationError::invalid(
                    "new_depth",
                    "must be 0 when new_parent_id is null",
                ));
            }
            if new_parent_id.is_some() && new_depth == 0 {
                return Err(OperationError::invalid(
                    "new_depth",
                    "must be positive when new_parent_id is set",
                ));
            }
            OperationParams::Reparent {
                new_parent_id,
                new_depth,
                old_parent_id,
                old_depth,
                new_child_index: optional_index(params, "new_child_index")?,
                old_child_index: optional_index(params, "old_child_index")?,
            }
        }
        OperationType::Split => {
            let new_item_id = required_id(params, "new_item_id")?;
            if new_item_id == item_id {
                return Err(OperationError::invalid(
                    "new_item_id",
                    "must differ from the split item",
                ));
            }
            OperationParams::Split {
                caret_position: required_index(params, "caret_position")?,
                new_item_id,
                restore: None,
            }
        }
        OperationType::Merge => {
            let previous_item_id = required_id(params, "previous_item_id")?;
            if previous_item_id == item_id {
                return Err(OperationError::invalid(
                    "previous_item_id",
                    "must differ from the merged item",
                ));
            }
            OperationParams::Merge {
                previous_item_id,
                captured: None,
            }
        }
        OperationType::Create => {
            let type_name = lookup(params, "type")
                .or_else(|| lookup(params, "item_type"))
                .ok_or_else(|| OperationError::invalid("type", "is required"))?
                .as_str()
                .ok_or_else(|| OperationError::invalid("type", "must be a string"))?;
            let item_type = ItemType::parse(type_name).ok_or_else(|| {
                OperationError::invalid("type", format!("unknown item type `{type_name}`"))
            })?;
            let item_data = match lookup(params, "item_data") {
                None | Some(Value::Null) => ItemData::default(),
                Some(value) => serde_json::from_value::<ItemData>(value.clone())
                    .map_err(|err| OperationError::invalid("item_data", err.to_string()))?,
            };
            let document_id = optional_string(params, "document_id")?;
            let group_id = optional_string(params, "group_id")?;
            let group = match (document_id, group_id) {
                (Some(document_id), Some(group_id)) => Some(GroupRef::new(document_id, group_id)),
                (None, None) => None,
                _ => {
                    return Err(OperationError::invalid(
                        "group_id",
                        "document_id and group_id must be given together",
                    ))
                }
            };
            OperationParams::Create {
                item_type,
                parent_id: nullable_id(params, "parent_id")?,
                index: required_index(params, "index")?,
                item_data,
                group,
                restore: None,
            }
        }
        OperationType::Delete => {
            let deleted_item = match lookup(params, "deleted_item") {
                None | Some(Value::Null) => None,
                Some(value) => Some(
                    serde_json::from_value::<CapturedSubtree>(value.clone())
                        .map_err(|err| OperationError::invalid("deleted_item", err.to_string()))?,
                ),
            };
            if let Some(subtree) = &deleted_item {
                if subtree.root.item.id != item_id {
                    return Err(OperationError::invalid(
                        "deleted_item",
                        "captured root does not match item_id",
                    ));
                }
            }
            OperationParams::Delete { deleted_item }
        }
    };

    Ok(Operation::new(item_id, parsed))
}

fn lookup<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    params
        .get(key)
        .or_else(|| params.get(camel_case(key).as_str()))
}

fn camel_case(key: &str) -> String {
    let mut result = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

fn required_string(params: &Map<String, Value>, key: &str) -> OperationResult<String> {
    match lookup(params, key) {
        None => Err(OperationError::invalid(key, "is required")),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(OperationError::invalid(key, "must be a string")),
    }
}

fn optional_string(params: &Map<String, Value>, key: &str) -> OperationResult<Option<String>> {
    match lookup(params, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(OperationError::invalid(key, "must be a string")),
    }
}

fn required_index(params: &Map<String, Value>, key: &str) -> OperationResult<usize> {
    match lookup(params, key) {
        None => Err(OperationError::invalid(key, "is required")),
        Some(value) => parse_index(key, value),
    }
}

fn optional_index(params: &Map<String, Value>, key: &str) -> OperationResult<Option<usize>> {
    match lookup(params, key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_index(key, value).map(Some),
    }
}

fn parse_index(key: &str, value: &Value) -> OperationResult<usize> {
    value
        .as_u64()
        .and_then(|raw| usize::try_from(raw).ok())
        .ok_or_else(|| OperationError::invalid(key, "must be a non-negative integer"))
}

fn required_id(params: &Map<String, Value>, key: &str) -> OperationResult<ItemId> {
    let raw = required_string(params, key)?;
    ItemId::parse(raw).map_err(|err| OperationError::invalid(key, err.to_string()))
}

/// Key must be present; `null` means "no parent".
fn nullable_id(params: &Map<String, Value>, key: &str) -> OperationResult<Option<ItemId>> {
    match lookup(params, key) {
        None => Err(OperationError::invalid(key, "is required (use null for root)")),
        Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => ItemId::parse(raw.clone())
            .map(Some)
            .map_err(|err| OperationError::invalid(key, err.to_string())),
        Some(_) => Err(OperationError::invalid(key, "must be a string or null")),
    }
}

#[cfg(test)]
mod tests {
    use super::{camel_case, create_operation};
    use crate::model::item::ItemType;
    use crate::operation::error::OperationError;
    use crate::operation::types::{OperationParams, OperationType};
    use serde_json::json;

    #[test]
    fn camel_case_converts_snake_keys() {
        assert_eq!(camel_case("new_parent_id"), "newParentId");
        assert_eq!(camel_case("index"), "index");
    }

    #[test]
    fn create_accepts_type_and_item_data() {
        let op = create_operation(
            OperationType::Create,
            "c1",
            &json!({"type": "task", "parent_id": null, "index": 0, "item_data": {"text": "Buy milk"}}),
        )
        .unwrap();
        match op.params {
            OperationParams::Create {
                item_type,
                parent_id,
                index,
                item_data,
                ..
            } => {
                assert_eq!(item_type, ItemType::Task);
                assert_eq!(parent_id, None);
                assert_eq!(index, 0);
                assert_eq!(item_data.text, "Buy milk");
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn move_accepts_camel_case_keys() {
        let op = create_operation(
            OperationType::Move,
            "b1",
            &json!({"newParentId": null, "newIndex": 0, "oldParentId": "a1", "oldIndex": 0}),
        )
        .unwrap();
        assert_eq!(op.kind(), OperationType::Move);
    }

    #[test]
    fn missing_and_mistyped_params_are_rejected() {
        let err = create_operation(OperationType::SetText, "a1", &json!({"new_text": "x"}))
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "old_text"));

        let err = create_operation(
            OperationType::Move,
            "a1",
            &json!({"new_parent_id": null, "new_index": -1, "old_parent_id": null, "old_index": 0}),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "new_index"));

        let err = create_operation(
            OperationType::Move,
            "a1",
            &json!({"new_index": 0, "old_parent_id": null, "old_index": 0}),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "new_parent_id"));
    }

    #[test]
    fn reparent_depth_must_match_parent_presence() {
        let err = create_operation(
            OperationType::Reparent,
            "a1",
            &json!({"new_parent_id": null, "new_depth": 1, "old_parent_id": "p", "old_depth": 1}),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "new_depth"));
    }

    #[test]
    fn unknown_item_type_and_bad_id_are_rejected() {
        let err = create_operation(
            OperationType::Create,
            "c1",
            &json!({"type": "widget", "parent_id": null, "index": 0}),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "type"));

        let err = create_operation(OperationType::Delete, "bad id", &json!({})).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParams { ref field, .. } if field == "item_id"));
    }

    #[test]
    fn create_type_falls_back_to_item_type_and_must_be_a_string() {
        let op = create_operation(
            OperationType::Create,
            "c1",
            &json!({"item_type": "note", "parent_id": null, "index": 0}),
        )
        .unwrap();
        assert!(matches!(op.params, OperationParams::Create { item_type: ItemType::Note, .. }));

        let err = create_operation(
            OperationType::Create,
            "c1",
            &json!({"type": 7, "parent_id": null, "index": 0}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OperationError::InvalidParams { ref field, ref message }
                if field == "type" && message == "must be a string"
        ));

        let err = create_operation(
            OperationType::Create,
            "c1",
            &json!({"parent_id": null, "index": 0}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OperationError::InvalidParams { ref message, .. } if message == "is required"
        ));
    }
}
