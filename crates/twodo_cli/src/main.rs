//! CLI smoke entry point.
//!
//! # Responsibility
//! - Link `twodo_core` and drive a short scripted edit session.
//! - Print the resulting outline and validation report deterministically.

use log::info;
use serde_json::json;
use std::process::ExitCode;
use twodo_core::{
    core_version, init_logging, Document, Editor, EditorConfig, Group, Item, ItemType,
    LoggingConfig, OperationError, OperationType, SignalBatcher, Store,
};

/// Absolute directory for rotated logs; logging stays off when unset.
const LOG_DIR_ENV: &str = "TWODO_LOG_DIR";

fn sample_store() -> Store {
    let mut parent = Item::new("a1".into(), ItemType::Task, "Parent");
    parent.child_ids.push("b1".into());
    let mut group = Group::new("bin-1", "Inbox");
    group.items.push(parent);
    group.items.push(Item::child_of(
        "b1".into(),
        "a1".into(),
        ItemType::Task,
        "Child",
    ));
    let mut document = Document::new("page-1", "Today");
    document.add_group(group);
    let mut store = Store::new();
    store.add_document(document);
    store
}

fn print_outline(store: &Store) {
    for document in &store.documents {
        for group in &document.groups {
            println!("{}/{}:", document.id, group.id);
            for item in &group.items {
                let indent = if item.parent_id.is_some() { "    " } else { "  " };
                println!("{indent}- [{}] {} {:?}", item.kind.as_str(), item.id, item.text);
            }
        }
    }
}

fn run(editor: &mut Editor<'_, SignalBatcher>) -> Result<(), OperationError> {
    let create = editor.create_operation(
        OperationType::Create,
        "c1",
        &json!({"type": "task", "parent_id": null, "index": 0, "item_data": {"text": "Buy milk"}}),
    )?;
    editor.try_apply(&create)?;

    let un_nest = editor.create_operation(
        OperationType::Move,
        "b1",
        &json!({"new_parent_id": null, "new_index": 0, "old_parent_id": "a1", "old_index": 0}),
    )?;
    editor.try_apply(&un_nest)?;

    let split = editor.create_operation(
        OperationType::Split,
        "c1",
        &json!({"caret_position": 3, "new_item_id": "c2"}),
    )?;
    editor.try_apply(&split)?;

    println!("after edits:");
    print_outline(editor.store());

    while editor.undo()?.is_some() {}
    println!("after undoing everything:");
    print_outline(editor.store());
    Ok(())
}

fn main() -> ExitCode {
    println!("twodo_core version={}", core_version());
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        let config = LoggingConfig {
            log_dir,
            ..LoggingConfig::default()
        };
        if let Err(err) = init_logging(&config) {
            eprintln!("logging disabled: {err}");
        }
    }

    let config = EditorConfig::default();
    let batcher = SignalBatcher::from_config(&config);
    let mut store = sample_store();
    let mut editor = match Editor::with_config(&mut store, batcher, config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("invalid editor config: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = run(&mut editor) {
        eprintln!("edit session failed: {err}");
        return ExitCode::FAILURE;
    }

    let report = editor.validate_state();
    let diagnosis = editor.diagnose_undo_issue();
    info!(
        "event=cli_session module=cli status=done valid={} history_valid={}",
        report.valid, diagnosis.valid
    );
    let batches = editor.bus_mut().flush_all();
    println!(
        "batches={} valid={} errors={} warnings={} history_valid={}",
        batches.len(),
        report.valid,
        report.errors.len(),
        report.warnings.len(),
        diagnosis.valid
    );
    if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
