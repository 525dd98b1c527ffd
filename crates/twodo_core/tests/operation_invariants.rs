use serde_json::json;
use twodo_core::{
    hierarchy::get_root_items, Document, Editor, ErrorKind, Group, InvariantReason, Item, ItemId,
    ItemType, NullBus, Operation, OperationType, Store,
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

fn parent_with_child() -> Store {
    let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
    parent.child_ids.push("b1".into());
    store_with(vec![
        parent,
        Item::child_of("b1".into(), "a1".into(), ItemType::Task, "Child"),
    ])
}

fn group(store: &Store) -> &Group {
    &store.documents[0].groups[0]
}

fn item<'a>(store: &'a Store, id: &str) -> &'a Item {
    group(store).item(&ItemId::from(id)).unwrap()
}

fn root_ids(store: &Store) -> Vec<String> {
    get_root_items(&group(store).items)
        .into_iter()
        .map(|item| item.id.to_string())
        .collect()
}

#[test]
fn move_child_to_root_and_back_restores_links() {
    let mut store = parent_with_child();
    let mut editor = Editor::new(&mut store, NullBus);

    let op = editor
        .create_operation(
            OperationType::Move,
            "b1",
            &json!({"new_parent_id": null, "new_index": 0, "old_parent_id": "a1", "old_index": 0}),
        )
        .unwrap();
    let committed = editor.try_apply(&op).unwrap();

    assert_eq!(item(editor.store(), "b1").parent_id, None);
    assert!(item(editor.store(), "a1").child_ids.is_empty());
    assert_eq!(root_ids(editor.store()), ["b1", "a1"]);

    editor.try_apply(&committed.inverse().unwrap()).unwrap();

    assert_eq!(
        item(editor.store(), "a1").child_ids,
        vec![ItemId::from("b1")]
    );
    assert_eq!(
        item(editor.store(), "b1").parent_id,
        Some(ItemId::from("a1"))
    );
    drop(editor);
    assert_eq!(store, parent_with_child());
}

#[test]
fn create_delete_undo_restores_root_position() {
    let mut store = store_with(vec![
        Item::new("r1".into(), ItemType::Task, "first"),
        Item::new("r2".into(), ItemType::Task, "second"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    let create = editor
        .create_operation(
            OperationType::Create,
            "c1",
            &json!({"type": "task", "parent_id": null, "index": 0, "item_data": {"text": "Buy milk"}}),
        )
        .unwrap();
    assert!(editor.apply_operation(&create).success);
    assert!(editor.apply_operation(&Operation::delete("c1".into())).success);
    assert!(editor.find_item(&ItemId::from("c1")).is_none());

    editor.undo().unwrap();

    let location = editor.find_item(&ItemId::from("c1")).unwrap();
    assert_eq!(location.item.text, "Buy milk");
    assert_eq!(location.item.kind, ItemType::Task);
    assert_eq!(root_ids(editor.store()), ["c1", "r1", "r2"]);
}

#[test]
fn nesting_under_target_with_grandchildren_is_refused() {
    let mut a = Item::new("a".into(), ItemType::Task, "A");
    a.child_ids.push("b".into());
    let mut c = Item::new("c".into(), ItemType::Task, "C");
    c.child_ids.push("d".into());
    let mut d = Item::child_of("d".into(), "c".into(), ItemType::Task, "D");
    d.child_ids.push("e".into());
    let mut store = store_with(vec![
        a,
        Item::child_of("b".into(), "a".into(), ItemType::Task, "B"),
        c,
        d,
        Item::child_of("e".into(), "d".into(), ItemType::Task, "E"),
    ]);
    let before = store.clone();
    let mut editor = Editor::new(&mut store, NullBus);

    let err = editor
        .try_apply(&Operation::move_item("b".into(), Some("c".into()), 0))
        .unwrap_err();

    assert_eq!(err.reason(), Some(InvariantReason::NestingDepth));
    drop(editor);
    assert_eq!(store, before);
}

#[test]
fn moving_a_parent_that_owns_children_under_a_root_is_too_deep() {
    let mut store = parent_with_child();
    store.documents[0].groups[0]
        .items
        .push(Item::new("x1".into(), ItemType::Task, "Other"));
    let mut editor = Editor::new(&mut store, NullBus);

    let outcome =
        editor.apply_operation(&Operation::move_item("a1".into(), Some("x1".into()), 0));

    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(ErrorKind::InvariantViolation));
}

#[test]
fn nesting_under_self_or_descendant_is_refused() {
    let mut store = parent_with_child();
    let before = store.clone();
    let mut editor = Editor::new(&mut store, NullBus);

    let err = editor
        .try_apply(&Operation::move_item("a1".into(), Some("b1".into()), 0))
        .unwrap_err();
    assert_eq!(err.reason(), Some(InvariantReason::Cycle));

    let err = editor
        .try_apply(&Operation::reparent("a1".into(), Some("a1".into()), 1))
        .unwrap_err();
    assert_eq!(err.reason(), Some(InvariantReason::SelfNest));

    drop(editor);
    assert_eq!(store, before);
}

#[test]
fn delete_cascades_without_dangling_ids() {
    let mut parent = Item::new("p".into(), ItemType::Task, "P");
    parent.child_ids = vec!["c1".into(), "c2".into()];
    let mut store = store_with(vec![
        parent,
        Item::child_of("c1".into(), "p".into(), ItemType::Task, "c1"),
        Item::child_of("c2".into(), "p".into(), ItemType::Task, "c2"),
        Item::new("s".into(), ItemType::Task, "S"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    editor.try_apply(&Operation::delete("c1".into())).unwrap();
    assert_eq!(item(editor.store(), "p").child_ids, vec![ItemId::from("c2")]);

    editor.try_apply(&Operation::delete("p".into())).unwrap();
    let remaining: Vec<&str> = group(editor.store())
        .items
        .iter()
        .map(|item| item.id.as_str())
        .collect();
    assert_eq!(remaining, ["s"]);
    assert!(editor.validate_state().valid);
}

#[test]
fn every_successful_operation_keeps_links_bidirectional() {
    let mut store = parent_with_child();
    let mut editor = Editor::new(&mut store, NullBus);
    let script = vec![
        Operation::create("n1".into(), ItemType::Note, None, 1, Default::default()),
        Operation::create("n2".into(), ItemType::Task, Some("n1".into()), 0, Default::default()),
        Operation::move_item("b1".into(), Some("n1".into()), 0),
        Operation::reparent("n2".into(), None, 0),
        Operation::split("a1".into(), 3, "a2".into()),
        Operation::merge("a2".into(), "a1".into()),
        Operation::delete("n1".into()),
    ];

    for operation in &script {
        editor.try_apply(operation).unwrap();
        let report = editor.validate_state();
        assert!(
            report.valid,
            "after {:?}: {:?}",
            operation.kind(),
            report.errors
        );
    }
}

#[test]
fn split_and_merge_reject_bad_targets() {
    let mut store = store_with(vec![
        Item::new("r1".into(), ItemType::Text, "abc"),
        Item::new("r2".into(), ItemType::Text, "def"),
        Item::new("r3".into(), ItemType::Text, "ghi"),
    ]);
    let mut editor = Editor::new(&mut store, NullBus);

    let err = editor
        .try_apply(&Operation::split("r1".into(), 9, "r4".into()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperationParams);

    let err = editor
        .try_apply(&Operation::split("r1".into(), 1, "r2".into()))
        .unwrap_err();
    assert_eq!(err.reason(), Some(InvariantReason::DuplicateId));

    let err = editor
        .try_apply(&Operation::merge("r3".into(), "r1".into()))
        .unwrap_err();
    assert_eq!(err.reason(), Some(InvariantReason::NotSibling));
    assert!(!editor.can_undo());
}

#[test]
fn create_rejects_missing_parent_and_group() {
    let mut store = parent_with_child();
    let mut editor = Editor::new(&mut store, NullBus);

    let outcome = editor.apply_operation(&Operation::create(
        "n1".into(),
        ItemType::Task,
        Some("ghost".into()),
        0,
        Default::default(),
    ));
    assert_eq!(outcome.error, Some(ErrorKind::NotFound));

    let outcome = editor.apply_operation(&Operation::create_in(
        twodo_core::GroupRef::new("page-1", "bin-9"),
        "n1".into(),
        ItemType::Task,
        0,
        Default::default(),
    ));
    assert_eq!(outcome.error, Some(ErrorKind::NotFound));
}
