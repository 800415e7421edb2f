//! Event repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide append-only persistence over canonical `events` storage.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Event::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Rows are never updated or deleted; an existing `id` keeps its first-seen row.
//! - Reads return events in insertion order (`seq ASC`).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::event::{instant_from_epoch_ms, Event, EventValidationError};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    magnitude,
    occurred_at_ms,
    updated_at_ms,
    place,
    tz_offset_minutes,
    network,
    latitude,
    longitude,
    depth_km
FROM events";

/// Matches the expression index created by migration 3.
const LAST_ACTIVITY_SQL: &str = "COALESCE(updated_at_ms, occurred_at_ms)";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for event persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EventValidationError),
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid event.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "event repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the durable event history.
pub trait EventRepository {
    /// Returns every stored event in insertion order.
    fn load_events(&self) -> RepoResult<Vec<Event>>;
    /// Appends events in one transaction and returns how many rows were inserted.
    ///
    /// Events whose `id` is already stored are skipped, not updated.
    fn append_events(&self, events: &[Event]) -> RepoResult<usize>;
    /// Returns events whose last activity (revision time, else origin time) is
    /// after `start` and, when `end` is set, not after `end`.
    fn list_events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<Event>>;
    fn count_events(&self) -> RepoResult<u64>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// Rejects connections that were not opened through [`crate::db::open_db`].
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn load_events(&self) -> RepoResult<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} ORDER BY seq ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn append_events(&self, events: &[Event]) -> RepoResult<usize> {
        for event in events {
            event.validate()?;
        }

        // Immediate: the write lock is held from the first read, so a concurrent
        // writer cannot interleave between the conflict check and the insert.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO events (
                    id,
                    magnitude,
                    occurred_at_ms,
                    updated_at_ms,
                    place,
                    tz_offset_minutes,
                    network,
                    latitude,
                    longitude,
                    depth_km
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO NOTHING;",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.id.as_str(),
                    event.magnitude,
                    event.occurred_at.timestamp_millis(),
                    event.updated_at.map(|at| at.timestamp_millis()),
                    event.place.as_str(),
                    event.timezone_offset_minutes,
                    event.network.as_deref(),
                    event.latitude,
                    event.longitude,
                    event.depth_km,
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn list_events_between(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<Event>> {
        let mut sql = format!("{EVENT_SELECT_SQL} WHERE {LAST_ACTIVITY_SQL} > ?");
        let mut bind_values = vec![Value::Integer(start.timestamp_millis())];
        if let Some(end) = end {
            sql.push_str(&format!(" AND {LAST_ACTIVITY_SQL} <= ?"));
            bind_values.push(Value::Integer(end.timestamp_millis()));
        }
        sql.push_str(" ORDER BY seq ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn count_events(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative event count {count}")))
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let id: String = row.get("id")?;

    let occurred_at_ms: i64 = row.get("occurred_at_ms")?;
    let occurred_at = instant_from_epoch_ms(occurred_at_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{occurred_at_ms}` in events.occurred_at_ms for `{id}`"
        ))
    })?;

    let updated_at = match row.get::<_, Option<i64>>("updated_at_ms")? {
        Some(value) => Some(instant_from_epoch_ms(value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{value}` in events.updated_at_ms for `{id}`"
            ))
        })?),
        None => None,
    };

    let timezone_offset_minutes = match row.get::<_, Option<i64>>("tz_offset_minutes")? {
        Some(value) => Some(i32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid offset `{value}` in events.tz_offset_minutes for `{id}`"
            ))
        })?),
        None => None,
    };

    let event = Event {
        magnitude: row.get("magnitude")?,
        occurred_at,
        updated_at,
        place: row.get("place")?,
        timezone_offset_minutes,
        network: row.get("network")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        depth_km: row.get("depth_km")?,
        id,
    };
    event
        .validate()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    Ok(event)
}
