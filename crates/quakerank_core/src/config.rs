//! Validated run configuration.
//!
//! # Responsibility
//! - Hold every knob of one analyzer run in an immutable struct.
//! - Reject unsupported option values before any I/O happens.
//!
//! # Invariants
//! - An `AnalyzerConfig` that exists has passed `validate()`.
//! - Configuration errors name the offending value and the accepted set.

use crate::feed::FeedWindow;
use crate::region::RegionMode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_TOP_REGIONS: usize = 10;
pub const DEFAULT_DB_PATH: &str = "usgs_output/quakerank.sqlite3";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors raised before a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        option: &'static str,
        value: String,
        accepted: &'static [&'static str],
    },
    /// Geocoded grouping was requested without an API key.
    MissingGeocoderKey,
    ZeroTopRegions,
}

impl ConfigError {
    pub(crate) fn invalid(
        option: &'static str,
        value: &str,
        accepted: &'static [&'static str],
    ) -> Self {
        Self::InvalidValue {
            option,
            value: value.to_string(),
            accepted,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                option,
                value,
                accepted,
            } => write!(
                f,
                "`{value}` is not a valid {option}; expected one of {}",
                accepted.join("|")
            ),
            Self::MissingGeocoderKey => write!(
                f,
                "geocoded region types require a MapQuest API key (MAPQUEST_API_KEY)"
            ),
            Self::ZeroTopRegions => write!(f, "number of regions must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

/// Where the run reads upstream records from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSelection {
    /// One of the USGS summary feeds.
    Usgs(FeedWindow),
    /// Any GeoJSON summary URL.
    Url(String),
    /// Local GeoJSON `FeatureCollection` file.
    File(PathBuf),
}

impl Default for FeedSelection {
    fn default() -> Self {
        Self::Usgs(FeedWindow::Month)
    }
}

/// Immutable settings for one analyzer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Trailing window length in days.
    pub window_days: u32,
    pub region_mode: RegionMode,
    /// Number of ranked regions to report.
    pub top_regions: usize,
    pub db_path: PathBuf,
    pub feed: FeedSelection,
    pub http_timeout: Duration,
    pub geocoder_key: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            region_mode: RegionMode::Place,
            top_regions: DEFAULT_TOP_REGIONS,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            feed: FeedSelection::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            geocoder_key: None,
        }
    }
}

impl AnalyzerConfig {
    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_regions == 0 {
            return Err(ConfigError::ZeroTopRegions);
        }
        if self.region_mode.granularity().is_some()
            && self
                .geocoder_key
                .as_deref()
                .map_or(true, |key| key.trim().is_empty())
        {
            return Err(ConfigError::MissingGeocoderKey);
        }
        Ok(())
    }
}
