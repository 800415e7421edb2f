//! Trailing time window used to select events for a report.

use chrono::{DateTime, Duration, Utc};

/// Half-open window `(start, end]` over event origin times.
///
/// `end = None` leaves the window open towards the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Window covering the `days` preceding `now`, closed at `now`.
    ///
    /// `days = 0` yields an empty window. A span reaching past the earliest
    /// representable instant starts there instead.
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Self {
        let start = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            start,
            end: Some(now),
        }
    }

    /// Returns whether `instant` is strictly after `start` and not after `end`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.start && self.end.map_or(true, |end| instant <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::TimeWindow;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn start_is_exclusive_and_end_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_days(now, 1);

        assert!(!window.contains(now - Duration::days(1)));
        assert!(window.contains(now - Duration::hours(23)));
        assert!(window.contains(now));
        assert!(!window.contains(now + Duration::seconds(1)));
    }

    #[test]
    fn zero_days_contains_nothing() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_days(now, 0);

        assert!(!window.contains(now));
        assert!(!window.contains(now - Duration::milliseconds(1)));
    }

    #[test]
    fn huge_span_saturates_at_earliest_instant() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_days(now, u32::MAX);

        assert_eq!(window.start, DateTime::<Utc>::MIN_UTC);
        assert!(window.contains(Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(now));
    }

    #[test]
    fn open_end_accepts_future_instants() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, None);

        assert!(window.contains(start + Duration::days(365)));
    }
}
