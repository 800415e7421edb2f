//! Seismic event domain model.
//!
//! # Responsibility
//! - Define the canonical event record shared by the store, feed and report layers.
//!
//! # Invariants
//! - Every event is identified by the upstream `id`, which is the dedup key.
//! - Events are immutable once accepted into the store.

pub mod event;
pub mod window;
