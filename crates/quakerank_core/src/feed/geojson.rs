//! USGS GeoJSON summary format.
//!
//! Only the fields the store keeps are decoded; everything else in a feature
//! is ignored.

use super::{FeedError, FeedResult};
use crate::model::event::{instant_from_epoch_ms, Event};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

/// One GeoJSON feature as published by the summary feeds.
#[derive(Debug, Deserialize)]
pub struct Feature {
    pub id: String,
    pub properties: Properties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default)]
    pub place: Option<String>,
    /// Origin time, epoch milliseconds.
    #[serde(default)]
    pub time: Option<i64>,
    /// Last revision time, epoch milliseconds.
    #[serde(default)]
    pub updated: Option<i64>,
    #[serde(default)]
    pub tz: Option<i32>,
    #[serde(default)]
    pub net: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude, depth_km]`.
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

impl Feature {
    /// Converts the feature into a validated [`Event`].
    ///
    /// The origin time falls back to the revision time when absent; a feature
    /// with neither is rejected.
    pub fn into_event(self) -> FeedResult<Event> {
        let Feature {
            id,
            properties,
            geometry,
        } = self;

        let epoch_ms = properties.time.or(properties.updated).ok_or_else(|| {
            FeedError::InvalidRecord {
                id: id.clone(),
                message: "missing both `time` and `updated`".to_string(),
            }
        })?;
        let occurred_at = instant_from_epoch_ms(epoch_ms).ok_or_else(|| FeedError::InvalidRecord {
            id: id.clone(),
            message: format!("timestamp {epoch_ms} is out of range"),
        })?;
        let updated_at = properties.updated.and_then(instant_from_epoch_ms);

        let coordinates = geometry.map(|g| g.coordinates).unwrap_or_default();
        let mut event = Event::new(id, occurred_at, properties.place.unwrap_or_default());
        event.magnitude = properties.mag;
        event.updated_at = updated_at;
        event.timezone_offset_minutes = properties.tz;
        event.network = properties.net.filter(|net| !net.trim().is_empty());
        event.longitude = coordinates.first().copied();
        event.latitude = coordinates.get(1).copied();
        event.depth_km = coordinates.get(2).copied();

        event.validate().map_err(|err| FeedError::InvalidRecord {
            id: event.id.clone(),
            message: err.to_string(),
        })?;
        Ok(event)
    }
}

/// Parses a GeoJSON `FeatureCollection` body into events, in feed order.
pub fn parse_feature_collection(body: &str) -> FeedResult<Vec<Event>> {
    let collection: FeatureCollection = serde_json::from_str(body).map_err(FeedError::Malformed)?;
    collection
        .features
        .into_iter()
        .map(Feature::into_event)
        .collect()
}

/// Parses a bare JSON array of features.
pub fn parse_feature_list(body: &str) -> FeedResult<Vec<Event>> {
    let features: Vec<Feature> = serde_json::from_str(body).map_err(FeedError::Malformed)?;
    features.into_iter().map(Feature::into_event).collect()
}
