use std::time::{Duration, Instant};
use twodo_core::{
    BatchSubscriber, Document, Editor, Group, Item, ItemType, Operation, Persistence,
    PersistenceSubscriber, Signal, SignalBatch, SignalBatcher, Store,
};

fn store() -> Store {
    let mut group = Group::new("bin-1", "Inbox");
    group.items.push(Item::new("a1".into(), ItemType::Task, "Parent"));
    let mut document = Document::new("page-1", "Today");
    document.add_group(group);
    let mut store = Store::new();
    store.add_document(document);
    store
}

#[derive(Default)]
struct CountingStorage {
    saves: usize,
    fail: bool,
}

impl Persistence for CountingStorage {
    fn save(&mut self) -> Result<(), String> {
        if self.fail {
            return Err("disk full".to_string());
        }
        self.saves += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Collector {
    batches: Vec<SignalBatch>,
}

impl BatchSubscriber for Collector {
    fn on_batch(&mut self, batch: &SignalBatch) {
        self.batches.push(batch.clone());
    }
}

#[test]
fn a_burst_of_edits_coalesces_per_signal_type() {
    let mut store = store();
    let mut batcher = SignalBatcher::new(Duration::from_millis(16));
    {
        let mut editor = Editor::new(&mut store, &mut batcher);
        editor
            .try_apply(&Operation::create(
                "c1".into(),
                ItemType::Task,
                None,
                1,
                Default::default(),
            ))
            .unwrap();
        editor
            .try_apply(&Operation::set_text("c1".into(), "Buy milk", ""))
            .unwrap();
        editor.try_apply(&Operation::delete("c1".into())).unwrap();
    }

    let batches = batcher.flush_due(Instant::now() + Duration::from_secs(1));

    assert_eq!(
        batches,
        vec![
            SignalBatch::Render,
            SignalBatch::Save { immediate: false },
            SignalBatch::Created(vec!["c1".into()]),
            SignalBatch::Updated(vec!["c1".into()]),
            SignalBatch::Deleted(vec!["c1".into()]),
        ]
    );
    assert!(!batcher.has_pending());
}

#[test]
fn persistence_saves_once_per_burst() {
    let mut store = store();
    let mut batcher = SignalBatcher::new(Duration::from_millis(16));
    {
        let mut editor = Editor::new(&mut store, &mut batcher);
        for round in 0..5 {
            editor
                .try_apply(&Operation::set_text(
                    "a1".into(),
                    format!("edit {round}"),
                    "",
                ))
                .unwrap();
        }
    }
    let mut saver = PersistenceSubscriber::new(CountingStorage::default());
    let mut collector = Collector::default();

    let dispatched = batcher.dispatch_due(
        Instant::now() + Duration::from_secs(1),
        &mut [
            &mut saver as &mut dyn BatchSubscriber,
            &mut collector as &mut dyn BatchSubscriber,
        ],
    );

    assert_eq!(dispatched, 3);
    assert_eq!(saver.persistence().saves, 1);
    assert_eq!(saver.failures(), 0);
    assert_eq!(
        collector.batches.last(),
        Some(&SignalBatch::Updated(vec!["a1".into(); 5]))
    );
}

#[test]
fn nothing_fires_inside_the_window() {
    let start = Instant::now();
    let mut batcher = SignalBatcher::new(Duration::from_millis(50));
    batcher.publish_at(Signal::RenderRequested, start);
    batcher.publish_at(Signal::RenderRequested, start + Duration::from_millis(40));

    assert!(batcher
        .flush_due(start + Duration::from_millis(60))
        .is_empty());
    assert_eq!(
        batcher.flush_due(start + Duration::from_millis(90)),
        vec![SignalBatch::Render]
    );
}

#[test]
fn failed_save_is_counted_not_raised() {
    let mut batcher = SignalBatcher::new(Duration::from_millis(1));
    let now = Instant::now();
    batcher.publish_at(Signal::SaveRequested { immediate: true }, now);
    let mut saver = PersistenceSubscriber::new(CountingStorage {
        saves: 0,
        fail: true,
    });

    batcher.dispatch_due(
        now + Duration::from_millis(5),
        &mut [&mut saver as &mut dyn BatchSubscriber],
    );

    assert_eq!(saver.failures(), 1);
    assert_eq!(saver.persistence().saves, 0);
}
