use twodo_core::{
    Document, Editor, ErrorKind, Group, Item, ItemId, ItemType, LegacyIndexAdapter, NullBus,
    Store,
};

fn store_with(items: Vec<Item>) -> Store {
    let mut group = Group::new("bin-1", "Inbox");
    group.items = items;
    let mut document = Document::new("page-1", "Today");
    document.add_group(group);
    let mut store = Store::new();
    store.add_document(document);
    store
}

fn order(editor: &Editor<'_, NullBus>) -> Vec<String> {
    editor.store().documents[0].groups[0]
        .items
        .iter()
        .map(|item| item.id.to_string())
        .collect()
}

#[test]
fn move_element_un_nests_a_child() {
    let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
    parent.child_ids.push("b1".into());
    let mut store = store_with(vec![
        parent,
        Item::child_of("b1".into(), "a1".into(), ItemType::Task, "Child"),
        Item::new("r2".into(), ItemType::Task, "Other"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    let position = LegacyIndexAdapter::new(&mut editor)
        .move_element("page-1", "bin-1", 1, 0)
        .unwrap();

    assert_eq!(order(&editor), ["b1", "a1", "r2"]);
    assert_eq!(position.flat_index, 0);
    assert_eq!(position.parent_flat_index, None);
    assert!(editor
        .find_item(&ItemId::from("a1"))
        .unwrap()
        .item
        .child_ids
        .is_empty());

    editor.undo().unwrap();
    assert_eq!(order(&editor), ["a1", "b1", "r2"]);
}

#[test]
fn nest_element_appends_under_target() {
    let mut store = store_with(vec![
        Item::new("r1".into(), ItemType::Task, "r1"),
        Item::new("r2".into(), ItemType::Task, "r2"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    let position = LegacyIndexAdapter::new(&mut editor)
        .nest_element("page-1", "bin-1", 1, 0)
        .unwrap();

    assert_eq!(position.flat_index, 1);
    assert_eq!(position.parent_flat_index, Some(0));
    let parent = editor.find_item(&ItemId::from("r1")).unwrap().item;
    assert_eq!(parent.child_ids, vec![ItemId::from("r2")]);
}

#[test]
fn reorder_child_moves_before_target_slot() {
    let mut parent = Item::new("p".into(), ItemType::Task, "p");
    parent.child_ids = vec!["c1".into(), "c2".into(), "c3".into()];
    let mut store = store_with(vec![
        parent,
        Item::child_of("c1".into(), "p".into(), ItemType::Task, "c1"),
        Item::child_of("c2".into(), "p".into(), ItemType::Task, "c2"),
        Item::child_of("c3".into(), "p".into(), ItemType::Task, "c3"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    let position = LegacyIndexAdapter::new(&mut editor)
        .reorder_child_element("page-1", "bin-1", 0, 0, 3)
        .unwrap();

    assert_eq!(order(&editor), ["p", "c2", "c3", "c1"]);
    assert_eq!(position.flat_index, 3);
    assert_eq!(position.parent_flat_index, Some(0));
    let parent = editor.find_item(&ItemId::from("p")).unwrap().item;
    assert_eq!(
        parent.child_ids,
        vec![ItemId::from("c2"), ItemId::from("c3"), ItemId::from("c1")]
    );
}

#[test]
fn unknown_group_is_not_found() {
    let mut store = store_with(vec![Item::new("r1".into(), ItemType::Task, "r1")]);
    let mut editor = Editor::new(&mut store, NullBus);

    let err = LegacyIndexAdapter::new(&mut editor)
        .move_element("page-1", "bin-404", 0, 0)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}
