//! Place-string normalization.
//!
//! Upstream place strings carry a distance/direction prefix relative to a
//! named location (`8km ENE of Eielson Air Force Base, Alaska`). Grouping by
//! place uses only the named location.

use once_cell::sync::Lazy;
use regex::Regex;

static DISTANCE_QUALIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*\d+(?:\.\d+)?\s?km\s+\w+\s+of\s+(.+)$").expect("valid distance qualifier regex")
});

/// Strips a leading `"<number>km <direction> of "` qualifier.
///
/// Returns the input unchanged when the qualifier is absent, including for
/// empty input.
pub fn base_place(place: &str) -> &str {
    DISTANCE_QUALIFIER_RE
        .captures(place)
        .and_then(|captures| captures.get(1))
        .map_or(place, |location| location.as_str())
}

#[cfg(test)]
mod tests {
    use super::base_place;

    #[test]
    fn strips_distance_and_direction() {
        assert_eq!(
            base_place("8km ENE of Eielson Air Force Base, Alaska"),
            "Eielson Air Force Base, Alaska"
        );
        assert_eq!(base_place("4km N of Fontana, CA"), "Fontana, CA");
    }

    #[test]
    fn keeps_multiline_location_after_qualifier() {
        assert_eq!(
            base_place("3km E of Ridgecrest,\nCA"),
            "Ridgecrest,\nCA"
        );
    }

    #[test]
    fn accepts_fractional_distance() {
        assert_eq!(base_place("2.5km SW of Volcano, Hawaii"), "Volcano, Hawaii");
    }

    #[test]
    fn keeps_non_ascii_location_names() {
        assert_eq!(
            base_place("12km S of San José del Cabo, Mexico"),
            "San José del Cabo, Mexico"
        );
    }

    #[test]
    fn unmatched_input_is_returned_unchanged() {
        assert_eq!(base_place("Next Door"), "Next Door");
        assert_eq!(base_place("Southern Mid-Atlantic Ridge"), "Southern Mid-Atlantic Ridge");
        assert_eq!(base_place(""), "");
    }

    #[test]
    fn qualifier_must_lead_the_string() {
        assert_eq!(
            base_place("Offshore, 8km ENE of Eielson"),
            "Offshore, 8km ENE of Eielson"
        );
    }
}
