//! Per-type debounce of editor signals.
//!
//! # Responsibility
//! - Coalesce bursts of signals so one user gesture yields one downstream
//!   effect per signal type.
//! - Hand due batches to subscribers such as the persistence adapter.
//!
//! # Invariants
//! - Debounce, not throttle: each publish restarts its type's window, so the
//!   last signal of a burst decides when the batch fires.
//! - Element signals keep every id in publish order; render collapses to
//!   one trigger; save keeps only the latest flag.
//! - Time is always passed in, never read inside the flush path.

use crate::config::EditorConfig;
use crate::model::item::ItemId;
use crate::signal::{Signal, SignalBus, SignalType};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Coalesced output for one signal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalBatch {
    Render,
    Save { immediate: bool },
    Created(Vec<ItemId>),
    Updated(Vec<ItemId>),
    Deleted(Vec<ItemId>),
}

impl SignalBatch {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::Render => SignalType::RenderRequested,
            Self::Save { .. } => SignalType::SaveRequested,
            Self::Created(_) => SignalType::ElementCreated,
            Self::Updated(_) => SignalType::ElementUpdated,
            Self::Deleted(_) => SignalType::ElementDeleted,
        }
    }

    fn absorb(&mut self, signal: Signal) {
        match (self, signal) {
            (Self::Save { immediate }, Signal::SaveRequested { immediate: latest }) => {
                *immediate = latest;
            }
            (Self::Created(ids), Signal::ElementCreated(id))
            | (Self::Updated(ids), Signal::ElementUpdated(id))
            | (Self::Deleted(ids), Signal::ElementDeleted(id)) => ids.push(id),
            _ => {}
        }
    }
}

impl From<Signal> for SignalBatch {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::RenderRequested => Self::Render,
            Signal::SaveRequested { immediate } => Self::Save { immediate },
            Signal::ElementCreated(id) => Self::Created(vec![id]),
            Signal::ElementUpdated(id) => Self::Updated(vec![id]),
            Signal::ElementDeleted(id) => Self::Deleted(vec![id]),
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    deadline: Instant,
    batch: SignalBatch,
}

/// Debouncing [`SignalBus`].
#[derive(Debug, Clone)]
pub struct SignalBatcher {
    window: Duration,
    pending: BTreeMap<SignalType, Pending>,
}

impl SignalBatcher {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    /// Uses the configured `batch_window_ms`.
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.batch_window())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedules `signal` as if published at `now`.
    pub fn publish_at(&mut self, signal: Signal, now: Instant) {
        let deadline = now + self.window;
        let signal_type = signal.signal_type();
        match self.pending.get_mut(&signal_type) {
            Some(pending) => {
                pending.deadline = deadline;
                pending.batch.absorb(signal);
            }
            None => {
                self.pending.insert(
                    signal_type,
                    Pending {
                        deadline,
                        batch: SignalBatch::from(signal),
                    },
                );
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Earliest deadline among pending batches.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    /// Removes and returns every batch whose window has elapsed at `now`.
    pub fn flush_due(&mut self, now: Instant) -> Vec<SignalBatch> {
        let due: Vec<SignalType> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(signal_type, _)| *signal_type)
            .collect();
        due.into_iter()
            .filter_map(|signal_type| self.pending.remove(&signal_type))
            .map(|pending| pending.batch)
            .collect()
    }

    /// Removes and returns every pending batch regardless of its window.
    pub fn flush_all(&mut self) -> Vec<SignalBatch> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(|pending| pending.batch)
            .collect()
    }

    /// Flushes due batches into `subscribers`. Returns the batch count.
    pub fn dispatch_due(
        &mut self,
        now: Instant,
        subscribers: &mut [&mut dyn BatchSubscriber],
    ) -> usize {
        let batches = self.flush_due(now);
        for batch in &batches {
            debug!(
                "event=signal_dispatch module=signal status=ok type={} subscribers={}",
                batch.signal_type().as_str(),
                subscribers.len()
            );
            for subscriber in subscribers.iter_mut() {
                subscriber.on_batch(batch);
            }
        }
        batches.len()
    }
}

impl Default for SignalBatcher {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl SignalBus for SignalBatcher {
    fn publish(&mut self, signal: Signal) {
        self.publish_at(signal, Instant::now());
    }
}

/// Receiver of coalesced batches.
pub trait BatchSubscriber {
    fn on_batch(&mut self, batch: &SignalBatch);
}

/// Storage collaborator; the core knows nothing about the medium.
pub trait Persistence {
    fn save(&mut self) -> Result<(), String>;
}

/// Calls [`Persistence::save`] once per save batch.
#[derive(Debug)]
pub struct PersistenceSubscriber<P: Persistence> {
    persistence: P,
    failures: usize,
}

impl<P: Persistence> PersistenceSubscriber<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            persistence,
            failures: 0,
        }
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl<P: Persistence> BatchSubscriber for PersistenceSubscriber<P> {
    fn on_batch(&mut self, batch: &SignalBatch) {
        let SignalBatch::Save { immediate } = batch else {
            return;
        };
        if let Err(err) = self.persistence.save() {
            self.failures += 1;
            warn!(
                "event=persistence_save module=signal status=error immediate={} error={}",
                immediate, err
            );
        }
    }
}
