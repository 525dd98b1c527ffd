//! Bounded log of full-store snapshots.

use crate::model::document::Store;
use crate::operation::now_epoch_ms;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Full copy of the store taken after `change_index` recorded entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub change_index: u64,
    pub timestamp: i64,
    pub state: Store,
}

/// Keeps at most `max_snapshots` snapshots, oldest evicted first.
#[derive(Debug, Clone)]
pub struct SnapshotLog {
    interval: usize,
    max_snapshots: usize,
    snapshots: VecDeque<Snapshot>,
}

impl SnapshotLog {
    pub fn new(interval: usize, max_snapshots: usize) -> Self {
        Self {
            interval: interval.max(1),
            max_snapshots: max_snapshots.max(1),
            snapshots: VecDeque::new(),
        }
    }

    /// Whether the periodic schedule asks for a snapshot at `change_index`.
    pub fn is_due(&self, change_index: u64) -> bool {
        change_index > 0 && change_index % self.interval as u64 == 0
    }

    pub fn capture(&mut self, change_index: u64, store: &Store) -> &Snapshot {
        if self.snapshots.len() == self.max_snapshots {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(Snapshot {
            change_index,
            timestamp: now_epoch_ms(),
            state: store.clone(),
        });
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}
