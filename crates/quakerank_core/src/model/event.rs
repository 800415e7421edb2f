//! Event domain model.
//!
//! # Responsibility
//! - Define the record persisted by the event store and consumed by reports.
//! - Validate field-level invariants before persistence and after reads.
//!
//! # Invariants
//! - `id` is non-empty and never reused for another event.
//! - `magnitude`, when present, is a finite log10-scale value.
//! - Coordinates, when present, lie inside WGS84 bounds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upstream event identifier (e.g. `ak0165gb1e2k`).
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EventId = String;

/// One seismic occurrence as accepted into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique upstream id; the dedup key.
    pub id: EventId,
    /// Reported magnitude (log10 scale). The feed publishes `null` for some events.
    pub magnitude: Option<f64>,
    /// Origin time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Last upstream revision time, when reported.
    pub updated_at: Option<DateTime<Utc>>,
    /// Free-text location, e.g. `8km ENE of Eielson Air Force Base, Alaska`.
    pub place: String,
    /// Local timezone offset from UTC in minutes.
    pub timezone_offset_minutes: Option<i32>,
    /// Reporting network code, e.g. `ak`, `ci`, `us`.
    pub network: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
}

impl Event {
    /// Creates an event with only the required fields set.
    pub fn new(id: impl Into<EventId>, occurred_at: DateTime<Utc>, place: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            magnitude: None,
            occurred_at,
            updated_at: None,
            place: place.into(),
            timezone_offset_minutes: None,
            network: None,
            latitude: None,
            longitude: None,
            depth_km: None,
        }
    }

    /// Instant used for time-window selection: the last upstream revision,
    /// or the origin time when the event was never revised.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.occurred_at)
    }

    /// Returns the epicenter as `(latitude, longitude)` when both are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Validates field-level invariants.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.id.trim().is_empty() {
            return Err(EventValidationError::EmptyId);
        }

        if let Some(magnitude) = self.magnitude {
            if !magnitude.is_finite() {
                return Err(EventValidationError::NonFiniteMagnitude {
                    id: self.id.clone(),
                    value: magnitude,
                });
            }
        }

        if let Some(latitude) = self.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(EventValidationError::CoordinateOutOfRange {
                    id: self.id.clone(),
                    field: "latitude",
                    value: latitude,
                });
            }
        }

        if let Some(longitude) = self.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(EventValidationError::CoordinateOutOfRange {
                    id: self.id.clone(),
                    field: "longitude",
                    value: longitude,
                });
            }
        }

        Ok(())
    }
}

/// Converts an epoch-milliseconds timestamp into a UTC instant.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn instant_from_epoch_ms(epoch_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(epoch_ms)
}

/// Field-level validation errors for [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventValidationError {
    EmptyId,
    NonFiniteMagnitude {
        id: EventId,
        value: f64,
    },
    CoordinateOutOfRange {
        id: EventId,
        field: &'static str,
        value: f64,
    },
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "event id cannot be empty"),
            Self::NonFiniteMagnitude { id, value } => {
                write!(f, "event `{id}` has non-finite magnitude {value}")
            }
            Self::CoordinateOutOfRange { id, field, value } => {
                write!(f, "event `{id}` has {field} {value} outside valid range")
            }
        }
    }
}

impl Error for EventValidationError {}

#[cfg(test)]
mod tests {
    use super::{instant_from_epoch_ms, Event, EventValidationError};

    fn sample() -> Event {
        let occurred_at = instant_from_epoch_ms(1_445_122_583_000).unwrap();
        Event::new("ci37369271", occurred_at, "4km N of Fontana, CA")
    }

    #[test]
    fn epoch_ms_converts_to_utc_instant() {
        let instant = instant_from_epoch_ms(1_445_122_583_000).unwrap();
        assert_eq!(instant.to_rfc3339(), "2015-10-17T22:56:23+00:00");
    }

    #[test]
    fn last_activity_prefers_revision_time() {
        let mut event = sample();
        assert_eq!(event.last_activity_at(), event.occurred_at);

        let revised = instant_from_epoch_ms(1_445_122_790_480).unwrap();
        event.updated_at = Some(revised);
        assert_eq!(event.last_activity_at(), revised);
    }

    #[test]
    fn validate_accepts_minimal_event() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_id() {
        let mut event = sample();
        event.id = "  ".to_string();
        assert_eq!(event.validate(), Err(EventValidationError::EmptyId));
    }

    #[test]
    fn validate_rejects_nan_magnitude() {
        let mut event = sample();
        event.magnitude = Some(f64::NAN);
        assert!(matches!(
            event.validate(),
            Err(EventValidationError::NonFiniteMagnitude { .. })
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_latitude() {
        let mut event = sample();
        event.latitude = Some(91.0);
        event.longitude = Some(10.0);
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn coordinates_require_both_axes() {
        let mut event = sample();
        event.latitude = Some(34.1);
        assert_eq!(event.coordinates(), None);
        event.longitude = Some(-117.4);
        assert_eq!(event.coordinates(), Some((34.1, -117.4)));
    }
}
