//! Document/group containers and the canonical store.
//!
//! # Responsibility
//! - Own item storage slots per group in canonical flat order.
//! - Resolve stable item ids to their current location by full scan.
//!
//! # Invariants
//! - A group exclusively owns its items; `parent_id` never crosses groups.
//! - Locations are recomputed on every lookup and never cached, since flat
//!   indices shift whenever a sibling is inserted or removed.

use crate::model::item::{Item, ItemId};
use serde::{Deserialize, Serialize};

/// Document ("page") identifier.
pub type DocumentId = String;

/// Group ("bin") identifier.
pub type GroupId = String;

/// Ordered container of items within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    /// Canonical storage order. Roots interleave with their children.
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Flat position of `id` in this group.
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.position(id).is_some()
    }

    /// Appends items from a bulk import as-is.
    ///
    /// Imported data is not checked here; run the state diagnostics
    /// afterwards to surface structural problems.
    pub fn import_items(&mut self, items: impl IntoIterator<Item = Item>) {
        self.items.extend(items);
    }
}

/// Top-level container of groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            groups: Vec::new(),
        }
    }

    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// Removes a group and, with it, every item it owns.
    pub fn remove_group(&mut self, group_id: &str) -> Option<Group> {
        let index = self.groups.iter().position(|group| group.id == group_id)?;
        Some(self.groups.remove(index))
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == group_id)
    }

    pub fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|group| group.id == group_id)
    }

    /// Whether any group of this document already holds `id`.
    pub fn contains_item(&self, id: &ItemId) -> bool {
        self.groups.iter().any(|group| group.contains(id))
    }
}

/// Stable reference to one group inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupRef {
    pub document_id: DocumentId,
    pub group_id: GroupId,
}

impl GroupRef {
    pub fn new(document_id: impl Into<DocumentId>, group_id: impl Into<GroupId>) -> Self {
        Self {
            document_id: document_id.into(),
            group_id: group_id.into(),
        }
    }
}

/// Numeric address of one item inside the store at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAddress {
    pub document_index: usize,
    pub group_index: usize,
    pub item_index: usize,
}

/// Result of a stable-id lookup.
#[derive(Debug, Clone, Copy)]
pub struct ItemLocation<'a> {
    pub item: &'a Item,
    pub document_id: &'a str,
    pub group_id: &'a str,
    /// Flat position inside `group.items`.
    pub item_index: usize,
    pub is_child: bool,
    pub parent_item: Option<&'a Item>,
    pub group: &'a Group,
    pub address: ItemAddress,
}

/// Canonical in-memory collection of documents.
///
/// Owned by the host and lent to the editor; nothing in the core keeps a
/// private copy outside history snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }

    /// Removes a document together with all its groups and items.
    pub fn remove_document(&mut self, document_id: &str) -> Option<Document> {
        let index = self
            .documents
            .iter()
            .position(|document| document.id == document_id)?;
        Some(self.documents.remove(index))
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|document| document.id == document_id)
    }

    pub fn document_mut(&mut self, document_id: &str) -> Option<&mut Document> {
        self.documents
            .iter_mut()
            .find(|document| document.id == document_id)
    }

    pub fn group(&self, document_id: &str, group_id: &str) -> Option<&Group> {
        self.document(document_id)?.group(group_id)
    }

    pub fn group_mut(&mut self, document_id: &str, group_id: &str) -> Option<&mut Group> {
        self.document_mut(document_id)?.group_mut(group_id)
    }

    /// Total item count across every document and group.
    pub fn item_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|document| document.groups.iter())
            .map(|group| group.items.len())
            .sum()
    }

    pub fn contains_item(&self, id: &ItemId) -> bool {
        self.locate(id).is_some()
    }

    /// Linear scan for the current numeric address of `id`.
    pub fn locate(&self, id: &ItemId) -> Option<ItemAddress> {
        for (document_index, document) in self.documents.iter().enumerate() {
            for (group_index, group) in document.groups.iter().enumerate() {
                if let Some(item_index) = group.position(id) {
                    return Some(ItemAddress {
                        document_index,
                        group_index,
                        item_index,
                    });
                }
            }
        }
        None
    }

    /// Resolves `id` to its full current location, or `None` when absent.
    pub fn find_item(&self, id: &ItemId) -> Option<ItemLocation<'_>> {
        let address = self.locate(id)?;
        let document = &self.documents[address.document_index];
        let group = &document.groups[address.group_index];
        let item = &group.items[address.item_index];
        let parent_item = item
            .parent_id
            .as_ref()
            .and_then(|parent_id| group.item(parent_id));
        Some(ItemLocation {
            item,
            document_id: document.id.as_str(),
            group_id: group.id.as_str(),
            item_index: address.item_index,
            is_child: item.parent_id.is_some(),
            parent_item,
            group,
            address,
        })
    }

    /// Document/group indices for `group_ref`.
    pub fn resolve_group(&self, group_ref: &GroupRef) -> Option<(usize, usize)> {
        let document_index = self
            .documents
            .iter()
            .position(|document| document.id == group_ref.document_id)?;
        let group_index = self.documents[document_index]
            .groups
            .iter()
            .position(|group| group.id == group_ref.group_id)?;
        Some((document_index, group_index))
    }

    /// First group of the first document that has one.
    pub fn default_group(&self) -> Option<(usize, usize)> {
        self.documents
            .iter()
            .enumerate()
            .find(|(_, document)| !document.groups.is_empty())
            .map(|(document_index, _)| (document_index, 0))
    }

    pub(crate) fn group_ref_at(&self, address: ItemAddress) -> GroupRef {
        let document = &self.documents[address.document_index];
        GroupRef::new(
            document.id.clone(),
            document.groups[address.group_index].id.clone(),
        )
    }

    pub(crate) fn group_at_mut(&mut self, address: ItemAddress) -> &mut Group {
        &mut self.documents[address.document_index].groups[address.group_index]
    }

    pub(crate) fn document_at(&self, address: ItemAddress) -> &Document {
        &self.documents[address.document_index]
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Group, Store};
    use crate::model::item::{Item, ItemId, ItemType};

    fn sample_store() -> Store {
        let mut group = Group::new("bin-1", "Inbox");
        let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
        parent.child_ids.push("b1".into());
        group.items.push(parent);
        group.items.push(Item::child_of(
            "b1".into(),
            "a1".into(),
            ItemType::Task,
            "Child",
        ));
        let mut document = Document::new("page-1", "Today");
        document.add_group(Group::new("bin-0", "Empty"));
        document.add_group(group);
        let mut store = Store::new();
        store.add_document(document);
        store
    }

    #[test]
    fn find_item_reports_child_location() {
        let store = sample_store();
        let location = store.find_item(&ItemId::from("b1")).unwrap();
        assert_eq!(location.document_id, "page-1");
        assert_eq!(location.group_id, "bin-1");
        assert_eq!(location.item_index, 1);
        assert!(location.is_child);
        assert_eq!(location.parent_item.unwrap().id.as_str(), "a1");
        assert_eq!(location.address.group_index, 1);
    }

    #[test]
    fn find_item_returns_none_for_unknown_id() {
        let store = sample_store();
        assert!(store.find_item(&ItemId::from("zz")).is_none());
        assert_eq!(store.item_count(), 2);
    }

    #[test]
    fn removing_document_cascades_items() {
        let mut store = sample_store();
        let removed = store.remove_document("page-1").unwrap();
        assert_eq!(removed.groups.len(), 2);
        assert_eq!(store.item_count(), 0);
        assert!(!store.contains_item(&ItemId::from("a1")));
    }
}
