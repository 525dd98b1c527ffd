//! Outline domain model.
//!
//! # Responsibility
//! - Define documents, groups and items as the canonical editable shape.
//! - Provide stable-id lookup over the whole store.
//!
//! # Invariants
//! - `parent_id == None` iff the item is a root of its group.
//! - Every id in `child_ids` resolves to an item whose `parent_id` points back.
//! - Nesting never goes deeper than the configured depth limit.

pub mod document;
pub mod item;
