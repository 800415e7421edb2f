//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for the event history.
//! - Isolate SQLite query details from store/service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Event::validate()` before persistence.
//! - Corrupt persisted rows surface as `RepoError::InvalidData`, never as silent skips.

pub mod event_repo;
