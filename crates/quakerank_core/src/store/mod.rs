//! Event store: dedup, merge and persistence of the accumulated history.
//!
//! # Responsibility
//! - Own the set of previously seen events across runs.
//! - Import history written by the earlier two-file layout.

pub mod event_store;
pub mod legacy;
