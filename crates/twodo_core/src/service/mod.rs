//! Editor-level services.
//!
//! # Responsibility
//! - Expose the collaborator-facing editing API over the core modules.
//! - Keep hosts decoupled from history and signal plumbing.

pub mod editor;

pub use editor::{ApplyOutcome, Editor};
