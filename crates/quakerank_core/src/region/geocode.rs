//! Reverse geocoding collaborator.
//!
//! # Responsibility
//! - Map an epicenter coordinate to a country, state or city name.
//! - Keep the HTTP provider behind the [`ReverseGeocoder`] trait.
//!
//! # Invariants
//! - "No match" is `Ok(None)`, never an error.
//! - The API key never appears in log lines or error messages.

use crate::config::ConfigError;
use log::{debug, warn};
use reqwest::blocking::Client;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, Instant};

pub const MAPQUEST_REVERSE_URL: &str = "https://www.mapquestapi.com/geocoding/v1/reverse";

const GRANULARITY_NAMES: &[&str] = &["country", "state", "city"];

/// Administrative level requested from the geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Country,
    State,
    City,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::State => "state",
            Self::City => "city",
        }
    }

    /// MapQuest location field holding this level.
    pub fn admin_area(self) -> &'static str {
        match self {
            Self::Country => "adminArea1",
            Self::State => "adminArea3",
            Self::City => "adminArea5",
        }
    }
}

impl FromStr for Granularity {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(Self::Country),
            "state" => Ok(Self::State),
            "city" => Ok(Self::City),
            _ => Err(ConfigError::invalid(
                "geocoding granularity",
                value,
                GRANULARITY_NAMES,
            )),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type GeocodeResult<T> = Result<T, GeocodeError>;

#[derive(Debug)]
pub enum GeocodeError {
    Http(reqwest::Error),
    Status(u16),
    Malformed(serde_json::Error),
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "geocoder request failed: {err}"),
            Self::Status(status) => write!(f, "geocoder returned HTTP {status}"),
            Self::Malformed(err) => write!(f, "geocoder response is not valid JSON: {err}"),
        }
    }
}

impl Error for GeocodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Status(_) => None,
            Self::Malformed(err) => Some(err),
        }
    }
}

/// Coordinate-to-region lookup.
pub trait ReverseGeocoder {
    fn region_of(
        &self,
        latitude: f64,
        longitude: f64,
        granularity: Granularity,
    ) -> GeocodeResult<Option<String>>;
}

/// MapQuest reverse-geocoding client.
pub struct MapQuestGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl MapQuestGeocoder {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> GeocodeResult<Self> {
        Self::with_endpoint(MAPQUEST_REVERSE_URL, api_key, timeout)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> GeocodeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GeocodeError::Http)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl ReverseGeocoder for MapQuestGeocoder {
    fn region_of(
        &self,
        latitude: f64,
        longitude: f64,
        granularity: Granularity,
    ) -> GeocodeResult<Option<String>> {
        let started_at = Instant::now();
        let location = format!("{latitude},{longitude}");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("key", self.api_key.as_str()), ("location", location.as_str())])
            .send()
            // The request URL carries the API key.
            .map_err(|err| GeocodeError::Http(err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "event=geocode module=region status=error http_status={} duration_ms={}",
                status.as_u16(),
                started_at.elapsed().as_millis()
            );
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|err| GeocodeError::Http(err.without_url()))?;
        let region = parse_reverse_response(&body, granularity)?;
        debug!(
            "event=geocode module=region status=ok granularity={} matched={} duration_ms={}",
            granularity,
            region.is_some(),
            started_at.elapsed().as_millis()
        );
        Ok(region)
    }
}

/// Extracts the admin area for `granularity` from a MapQuest reverse response.
///
/// Missing results, missing fields and blank names are all "no match".
pub fn parse_reverse_response(body: &str, granularity: Granularity) -> GeocodeResult<Option<String>> {
    let value: Value = serde_json::from_str(body).map_err(GeocodeError::Malformed)?;
    let pointer = format!("/results/0/locations/0/{}", granularity.admin_area());
    Ok(value
        .pointer(&pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::{parse_reverse_response, Granularity};

    const LANCASTER_RESPONSE: &str = r#"{
        "results": [{
            "locations": [{
                "adminArea1": "US",
                "adminArea3": "PA",
                "adminArea5": "Lancaster"
            }]
        }]
    }"#;

    #[test]
    fn granularity_parses_known_names() {
        assert_eq!("country".parse::<Granularity>().unwrap(), Granularity::Country);
        assert_eq!(" STATE ".parse::<Granularity>().unwrap(), Granularity::State);
        assert_eq!("city".parse::<Granularity>().unwrap(), Granularity::City);
    }

    #[test]
    fn granularity_rejects_unknown_name_with_accepted_set() {
        let err = "county".parse::<Granularity>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("county"));
        assert!(message.contains("country|state|city"));
    }

    #[test]
    fn parse_picks_admin_area_for_each_granularity() {
        assert_eq!(
            parse_reverse_response(LANCASTER_RESPONSE, Granularity::Country).unwrap(),
            Some("US".to_string())
        );
        assert_eq!(
            parse_reverse_response(LANCASTER_RESPONSE, Granularity::State).unwrap(),
            Some("PA".to_string())
        );
        assert_eq!(
            parse_reverse_response(LANCASTER_RESPONSE, Granularity::City).unwrap(),
            Some("Lancaster".to_string())
        );
    }

    #[test]
    fn parse_treats_empty_results_and_blank_names_as_no_match() {
        assert_eq!(
            parse_reverse_response(r#"{"results": []}"#, Granularity::Country).unwrap(),
            None
        );
        assert_eq!(
            parse_reverse_response(
                r#"{"results": [{"locations": [{"adminArea5": ""}]}]}"#,
                Granularity::City
            )
            .unwrap(),
            None
        );
    }

    #[test]
    fn parse_rejects_non_json_body() {
        assert!(parse_reverse_response("<html>", Granularity::Country).is_err());
    }
}
