//! Append-only event store with identity-based dedup.
//!
//! # Responsibility
//! - Hydrate prior history from the durable repository.
//! - Merge candidate events, keeping the first-seen copy of every id.
//! - Persist only the events accepted since the last persist.
//!
//! # Invariants
//! - `known_ids` and `history` always describe the same set of ids.
//! - Events are never removed or replaced.
//! - `persist` touches storage only when `merge_new` accepted something.

use crate::model::event::{Event, EventId};
use crate::model::window::TimeWindow;
use crate::repo::event_repo::{EventRepository, RepoError, RepoResult};
use log::{debug, error, info};
use std::collections::HashSet;
use std::time::Instant;

/// In-memory view of the event history plus not-yet-persisted additions.
#[derive(Debug, Default)]
pub struct EventStore {
    known_ids: HashSet<EventId>,
    history: Vec<Event>,
    pending: Vec<Event>,
}

impl EventStore {
    /// Creates an empty store (cold start).
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstructs prior state from durable storage.
    ///
    /// An empty repository yields an empty store. Duplicate ids in persisted
    /// history are reported as corrupt data.
    pub fn load<R: EventRepository + ?Sized>(repo: &R) -> RepoResult<Self> {
        let started_at = Instant::now();
        let history = repo.load_events()?;

        let mut known_ids = HashSet::with_capacity(history.len());
        for event in &history {
            if !known_ids.insert(event.id.clone()) {
                error!(
                    "event=store_load module=store status=error error_code=duplicate_id duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Err(RepoError::InvalidData(format!(
                    "duplicate event id `{}` in persisted history",
                    event.id
                )));
            }
        }

        info!(
            "event=store_load module=store status=ok events={} duration_ms={}",
            history.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            known_ids,
            history,
            pending: Vec::new(),
        })
    }

    /// Ids of every event in the store, persisted or pending.
    pub fn known_ids(&self) -> &HashSet<EventId> {
        &self.known_ids
    }

    /// Full history in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known_ids.contains(id)
    }

    /// Returns whether events were accepted since the last persist.
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Appends every candidate whose id is not yet known.
    ///
    /// Returns `true` when at least one candidate was accepted. Known ids,
    /// including repeats inside the same batch, are dropped without updating
    /// the stored copy.
    pub fn merge_new<I>(&mut self, candidates: I) -> bool
    where
        I: IntoIterator<Item = Event>,
    {
        let mut accepted = 0usize;
        let mut skipped = 0usize;
        for candidate in candidates {
            if self.known_ids.contains(&candidate.id) {
                skipped += 1;
                continue;
            }
            self.known_ids.insert(candidate.id.clone());
            self.pending.push(candidate.clone());
            self.history.push(candidate);
            accepted += 1;
        }

        debug!(
            "event=store_merge module=store status=ok accepted={} skipped={} total={}",
            accepted,
            skipped,
            self.history.len()
        );
        accepted > 0
    }

    /// Writes pending events to durable storage.
    ///
    /// Returns the number of rows written; `0` without touching storage when
    /// nothing is pending. Pending events are kept on failure so a retry
    /// writes the same batch.
    pub fn persist<R: EventRepository + ?Sized>(&mut self, repo: &R) -> RepoResult<usize> {
        if self.pending.is_empty() {
            debug!("event=store_persist module=store status=skipped reason=no_changes");
            return Ok(0);
        }

        let started_at = Instant::now();
        match repo.append_events(&self.pending) {
            Ok(written) => {
                info!(
                    "event=store_persist module=store status=ok pending={} written={} duration_ms={}",
                    self.pending.len(),
                    written,
                    started_at.elapsed().as_millis()
                );
                self.pending.clear();
                Ok(written)
            }
            Err(err) => {
                error!(
                    "event=store_persist module=store status=error pending={} duration_ms={} error={}",
                    self.pending.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Iterates events whose last activity falls inside `window`, in insertion order.
    pub fn events_in<'a>(&'a self, window: &'a TimeWindow) -> impl Iterator<Item = &'a Event> + 'a {
        self.history
            .iter()
            .filter(move |event| window.contains(event.last_activity_at()))
    }
}

#[cfg(test)]
mod tests {
    use super::EventStore;
    use crate::model::event::Event;
    use crate::model::window::TimeWindow;
    use chrono::{Duration, TimeZone, Utc};

    fn event(id: &str, place: &str) -> Event {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Event::new(id, at, place)
    }

    #[test]
    fn merge_same_record_twice_is_noop_on_second_call() {
        let mut store = EventStore::new();

        assert!(store.merge_new(vec![event("a", "x")]));
        assert_eq!(store.len(), 1);

        assert!(!store.merge_new(vec![event("a", "x")]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merge_keeps_first_seen_copy() {
        let mut store = EventStore::new();
        store.merge_new(vec![event("a", "first")]);
        store.merge_new(vec![event("a", "second")]);

        assert_eq!(store.events()[0].place, "first");
    }

    #[test]
    fn merge_collapses_duplicates_inside_one_batch() {
        let mut store = EventStore::new();
        let changed = store.merge_new(vec![event("a", "first"), event("a", "second"), event("b", "y")]);

        assert!(changed);
        assert_eq!(store.len(), 2);
        assert_eq!(store.known_ids().len(), 2);
        assert_eq!(store.events()[0].place, "first");
    }

    #[test]
    fn merge_new_id_adds_exactly_one() {
        let mut store = EventStore::new();
        store.merge_new(vec![event("a", "x")]);

        assert!(store.merge_new(vec![event("a", "x"), event("b", "y")]));
        assert_eq!(store.len(), 2);
        assert!(store.contains("b"));
        assert!(store.has_pending_changes());
    }

    #[test]
    fn events_in_filters_by_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let mut recent = event("recent", "x");
        recent.occurred_at = now - Duration::days(1);
        let mut old = event("old", "x");
        old.occurred_at = now - Duration::days(40);
        let mut revised = event("revised", "x");
        revised.occurred_at = now - Duration::days(40);
        revised.updated_at = Some(now - Duration::days(2));

        let mut store = EventStore::new();
        store.merge_new(vec![old, recent, revised]);

        let window = TimeWindow::trailing_days(now, 30);
        let ids: Vec<&str> = store.events_in(&window).map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["recent", "revised"]);
    }
}
