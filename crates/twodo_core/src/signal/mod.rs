//! Signals emitted after committed mutations.
//!
//! # Responsibility
//! - Define the named events the core publishes after each commit.
//! - Define the publish seam; subscribers own their reactions.
//!
//! # Invariants
//! - Publishing never blocks and never fails the mutation that caused it.
//! - The core keeps no subscriber-specific state.

pub mod batcher;

use crate::model::item::ItemId;
use serde::{Deserialize, Serialize};

pub use batcher::{
    BatchSubscriber, Persistence, PersistenceSubscriber, SignalBatch, SignalBatcher,
};

/// Event published by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "item_id", rename_all = "snake_case")]
pub enum Signal {
    RenderRequested,
    SaveRequested { immediate: bool },
    ElementCreated(ItemId),
    ElementUpdated(ItemId),
    ElementDeleted(ItemId),
}

/// Debounce bucket of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalType {
    RenderRequested,
    SaveRequested,
    ElementCreated,
    ElementUpdated,
    ElementDeleted,
}

impl SignalType {
    /// Wire name used by collaborators.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RenderRequested => "render-requested",
            Self::SaveRequested => "save-requested",
            Self::ElementCreated => "element:created",
            Self::ElementUpdated => "element:updated",
            Self::ElementDeleted => "element:deleted",
        }
    }
}

impl Signal {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::RenderRequested => SignalType::RenderRequested,
            Self::SaveRequested { .. } => SignalType::SaveRequested,
            Self::ElementCreated(_) => SignalType::ElementCreated,
            Self::ElementUpdated(_) => SignalType::ElementUpdated,
            Self::ElementDeleted(_) => SignalType::ElementDeleted,
        }
    }
}

/// Publish seam between the editor and whatever reacts to its commits.
pub trait SignalBus {
    fn publish(&mut self, signal: Signal);
}

/// Bus that drops every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBus;

impl SignalBus for NullBus {
    fn publish(&mut self, _signal: Signal) {}
}

/// Bus that keeps every signal in publish order.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    pub published: Vec<Signal>,
}

impl RecordingBus {
    pub fn take(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.published)
    }
}

impl SignalBus for RecordingBus {
    fn publish(&mut self, signal: Signal) {
        self.published.push(signal);
    }
}

impl<B: SignalBus + ?Sized> SignalBus for &mut B {
    fn publish(&mut self, signal: Signal) {
        (**self).publish(signal);
    }
}
