//! Region grouping: maps events to the key they are aggregated under.
//!
//! # Responsibility
//! - Parse and name the supported grouping modes.
//! - Resolve one event to a region key, or to nothing when the event lacks
//!   the field the mode groups on.
//!
//! # Invariants
//! - Place grouping always yields a key (the unmodified place on no match).
//! - Geocoder failures drop the event; they never abort a run.

pub mod geocode;
pub mod place;

use crate::config::ConfigError;
use crate::model::event::Event;
use geocode::{Granularity, ReverseGeocoder};
use log::warn;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const REGION_MODE_NAMES: &[&str] = &[
    "timezone", "tz", "network", "net", "place", "country", "state", "city",
];

/// How events are grouped into regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMode {
    /// Timezone offset in minutes.
    Timezone,
    /// Reporting network code.
    Network,
    /// Named location from the place string.
    Place,
    /// Administrative area from reverse geocoding the epicenter.
    Geocoded(Granularity),
}

impl RegionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timezone => "timezone",
            Self::Network => "network",
            Self::Place => "place",
            Self::Geocoded(granularity) => granularity.as_str(),
        }
    }

    /// Granularity for geocoded modes.
    pub fn granularity(self) -> Option<Granularity> {
        match self {
            Self::Geocoded(granularity) => Some(granularity),
            _ => None,
        }
    }
}

impl FromStr for RegionMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "timezone" | "tz" => Ok(Self::Timezone),
            "network" | "net" => Ok(Self::Network),
            "place" => Ok(Self::Place),
            "country" => Ok(Self::Geocoded(Granularity::Country)),
            "state" => Ok(Self::Geocoded(Granularity::State)),
            "city" => Ok(Self::Geocoded(Granularity::City)),
            _ => Err(ConfigError::invalid("region type", value, REGION_MODE_NAMES)),
        }
    }
}

impl Display for RegionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping key of one region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RegionKey {
    /// Timezone offset in minutes.
    Offset(i32),
    Name(String),
}

impl Display for RegionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offset(minutes) => write!(f, "{minutes}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

type GeocodeCacheKey = (u64, u64, Granularity);

/// Resolves events to region keys for one grouping mode.
///
/// Geocoder lookups are memoized per coordinate for the resolver's lifetime.
pub struct RegionResolver<'g> {
    mode: RegionMode,
    geocoder: Option<&'g dyn ReverseGeocoder>,
    geocode_cache: RefCell<HashMap<GeocodeCacheKey, Option<String>>>,
}

impl<'g> RegionResolver<'g> {
    /// Creates a resolver for modes that need no geocoder.
    pub fn new(mode: RegionMode) -> Result<Self, ConfigError> {
        Self::with_geocoder(mode, None)
    }

    /// Creates a resolver; geocoded modes require `geocoder`.
    pub fn with_geocoder(
        mode: RegionMode,
        geocoder: Option<&'g dyn ReverseGeocoder>,
    ) -> Result<Self, ConfigError> {
        if mode.granularity().is_some() && geocoder.is_none() {
            return Err(ConfigError::MissingGeocoderKey);
        }
        Ok(Self {
            mode,
            geocoder,
            geocode_cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn mode(&self) -> RegionMode {
        self.mode
    }

    /// Returns the region `event` belongs to, or `None` when it has none.
    pub fn region_key(&self, event: &Event) -> Option<RegionKey> {
        match self.mode {
            RegionMode::Timezone => event.timezone_offset_minutes.map(RegionKey::Offset),
            RegionMode::Network => event.network.clone().map(RegionKey::Name),
            RegionMode::Place => Some(RegionKey::Name(place::base_place(&event.place).to_string())),
            RegionMode::Geocoded(granularity) => self.geocoded_key(event, granularity),
        }
    }

    fn geocoded_key(&self, event: &Event, granularity: Granularity) -> Option<RegionKey> {
        let geocoder = self.geocoder?;
        let (latitude, longitude) = event.coordinates()?;
        let cache_key = (latitude.to_bits(), longitude.to_bits(), granularity);

        if let Some(cached) = self.geocode_cache.borrow().get(&cache_key) {
            return cached.clone().map(RegionKey::Name);
        }

        let resolved = match geocoder.region_of(latitude, longitude, granularity) {
            Ok(region) => region,
            Err(err) => {
                warn!(
                    "event=region_resolve module=region status=error mode={} event_id={} error={}",
                    self.mode, event.id, err
                );
                None
            }
        };
        self.geocode_cache
            .borrow_mut()
            .insert(cache_key, resolved.clone());
        resolved.map(RegionKey::Name)
    }
}

#[cfg(test)]
mod tests {
    use super::geocode::{GeocodeError, GeocodeResult, Granularity, ReverseGeocoder};
    use super::{RegionKey, RegionMode, RegionResolver};
    use crate::config::ConfigError;
    use crate::model::event::Event;
    use chrono::{TimeZone, Utc};
    use std::cell::Cell;

    fn event(place: &str) -> Event {
        let at = Utc.with_ymd_and_hms(2015, 10, 17, 22, 56, 23).unwrap();
        let mut event = Event::new("ci37369271", at, place);
        event.timezone_offset_minutes = Some(-420);
        event.network = Some("ci".to_string());
        event.latitude = Some(34.1);
        event.longitude = Some(-117.4);
        event
    }

    struct CountingGeocoder {
        calls: Cell<usize>,
        fail: bool,
    }

    impl ReverseGeocoder for CountingGeocoder {
        fn region_of(&self, _: f64, _: f64, granularity: Granularity) -> GeocodeResult<Option<String>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(GeocodeError::Status(503));
            }
            Ok(Some(format!("{granularity}-match")))
        }
    }

    #[test]
    fn mode_names_and_aliases_parse() {
        assert_eq!("tz".parse::<RegionMode>().unwrap(), RegionMode::Timezone);
        assert_eq!("timezone".parse::<RegionMode>().unwrap(), RegionMode::Timezone);
        assert_eq!("NET".parse::<RegionMode>().unwrap(), RegionMode::Network);
        assert_eq!("place".parse::<RegionMode>().unwrap(), RegionMode::Place);
        assert_eq!(
            "city".parse::<RegionMode>().unwrap(),
            RegionMode::Geocoded(Granularity::City)
        );
    }

    #[test]
    fn unknown_mode_names_value_and_accepted_set() {
        let err = "zipcode".parse::<RegionMode>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == "zipcode"));
        let message = err.to_string();
        assert!(message.contains("zipcode"));
        assert!(message.contains("timezone|tz|network|net|place"));
    }

    #[test]
    fn timezone_and_network_modes_read_event_fields() {
        let tz = RegionResolver::new(RegionMode::Timezone).unwrap();
        let net = RegionResolver::new(RegionMode::Network).unwrap();
        let quake = event("4km N of Fontana, CA");

        assert_eq!(tz.region_key(&quake), Some(RegionKey::Offset(-420)));
        assert_eq!(net.region_key(&quake), Some(RegionKey::Name("ci".to_string())));
    }

    #[test]
    fn missing_fields_resolve_to_none() {
        let mut quake = event("somewhere");
        quake.timezone_offset_minutes = None;
        quake.network = None;

        assert_eq!(RegionResolver::new(RegionMode::Timezone).unwrap().region_key(&quake), None);
        assert_eq!(RegionResolver::new(RegionMode::Network).unwrap().region_key(&quake), None);
    }

    #[test]
    fn place_mode_strips_qualifier_or_keeps_input() {
        let resolver = RegionResolver::new(RegionMode::Place).unwrap();
        assert_eq!(
            resolver.region_key(&event("8km ENE of Eielson Air Force Base, Alaska")),
            Some(RegionKey::Name("Eielson Air Force Base, Alaska".to_string()))
        );
        assert_eq!(
            resolver.region_key(&event("Next Door")),
            Some(RegionKey::Name("Next Door".to_string()))
        );
        assert_eq!(
            resolver.region_key(&event("")),
            Some(RegionKey::Name(String::new()))
        );
    }

    #[test]
    fn geocoded_mode_requires_geocoder() {
        let result = RegionResolver::new(RegionMode::Geocoded(Granularity::Country));
        assert!(matches!(result, Err(ConfigError::MissingGeocoderKey)));
    }

    #[test]
    fn geocoded_lookups_are_memoized_per_coordinate() {
        let geocoder = CountingGeocoder {
            calls: Cell::new(0),
            fail: false,
        };
        let resolver =
            RegionResolver::with_geocoder(RegionMode::Geocoded(Granularity::State), Some(&geocoder))
                .unwrap();
        let quake = event("x");

        assert_eq!(
            resolver.region_key(&quake),
            Some(RegionKey::Name("state-match".to_string()))
        );
        assert_eq!(
            resolver.region_key(&quake),
            Some(RegionKey::Name("state-match".to_string()))
        );
        assert_eq!(geocoder.calls.get(), 1);
    }

    #[test]
    fn geocoder_failure_and_missing_coordinates_drop_the_event() {
        let geocoder = CountingGeocoder {
            calls: Cell::new(0),
            fail: true,
        };
        let resolver =
            RegionResolver::with_geocoder(RegionMode::Geocoded(Granularity::City), Some(&geocoder))
                .unwrap();

        assert_eq!(resolver.region_key(&event("x")), None);

        let mut no_coordinates = event("x");
        no_coordinates.latitude = None;
        assert_eq!(resolver.region_key(&no_coordinates), None);
        assert_eq!(geocoder.calls.get(), 1);
    }

    #[test]
    fn region_key_display_matches_table_rendering() {
        assert_eq!(RegionKey::Offset(-420).to_string(), "-420");
        assert_eq!(RegionKey::Name("ak".to_string()).to_string(), "ak");
    }
}
