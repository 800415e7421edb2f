//! Upstream event feed collaborators.
//!
//! # Responsibility
//! - Fetch a batch of raw event records from the USGS summary feed or a
//!   local GeoJSON file.
//! - Convert records into validated [`Event`]s.
//!
//! # Invariants
//! - A failed fetch yields an error and no partial batch.
//! - Fetching never touches the event store.

pub mod geojson;

use crate::config::ConfigError;
use crate::model::event::Event;
use log::{error, info};
use reqwest::blocking::Client;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

const USGS_SUMMARY_BASE_URL: &str = "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary";
const FEED_WINDOW_NAMES: &[&str] = &["hour", "day", "week", "month"];

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug)]
pub enum FeedError {
    Http {
        url: String,
        source: reqwest::Error,
    },
    Status {
        url: String,
        status: u16,
    },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Malformed(serde_json::Error),
    /// A record is structurally valid JSON but cannot become an event.
    InvalidRecord {
        id: String,
        message: String,
    },
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { url, source } => write!(f, "error getting earthquake data from {url}: {source}"),
            Self::Status { url, status } => {
                write!(f, "error getting earthquake data from {url}: HTTP {status}")
            }
            Self::Io { path, source } => {
                write!(f, "failed to read feed file `{}`: {source}", path.display())
            }
            Self::Malformed(err) => write!(f, "feed body is not a valid GeoJSON feature list: {err}"),
            Self::InvalidRecord { id, message } => write!(f, "invalid feed record `{id}`: {message}"),
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http { source, .. } => Some(source),
            Self::Status { .. } => None,
            Self::Io { source, .. } => Some(source),
            Self::Malformed(err) => Some(err),
            Self::InvalidRecord { .. } => None,
        }
    }
}

/// Source of one batch of upstream events.
pub trait FeedSource {
    fn fetch(&self) -> FeedResult<Vec<Event>>;
    /// Human-readable origin used in logs.
    fn describe(&self) -> String;
}

impl<T: FeedSource + ?Sized> FeedSource for Box<T> {
    fn fetch(&self) -> FeedResult<Vec<Event>> {
        (**self).fetch()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Retention window of a USGS summary feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedWindow {
    Hour,
    Day,
    Week,
    Month,
}

impl FeedWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// URL of the all-magnitudes summary feed for this window.
    pub fn url(self) -> String {
        format!("{USGS_SUMMARY_BASE_URL}/all_{}.geojson", self.as_str())
    }
}

impl FromStr for FeedWindow {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ConfigError::invalid("feed window", value, FEED_WINDOW_NAMES)),
        }
    }
}

/// HTTP client for a GeoJSON summary feed.
pub struct UsgsFeed {
    client: Client,
    url: String,
}

impl UsgsFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quakerank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FeedError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn for_window(window: FeedWindow, timeout: Duration) -> FeedResult<Self> {
        Self::new(window.url(), timeout)
    }

    fn fetch_body(&self) -> FeedResult<String> {
        let http_error = |source: reqwest::Error| FeedError::Http {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(http_error)
    }
}

impl FeedSource for UsgsFeed {
    fn fetch(&self) -> FeedResult<Vec<Event>> {
        let started_at = Instant::now();
        info!("event=feed_fetch module=feed status=start source=http");

        let result = self.fetch_body().and_then(|body| geojson::parse_feature_collection(&body));
        log_fetch_outcome("http", started_at, &result);
        result
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads a GeoJSON `FeatureCollection` from disk.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl FeedSource for FileFeed {
    fn fetch(&self) -> FeedResult<Vec<Event>> {
        let started_at = Instant::now();
        info!("event=feed_fetch module=feed status=start source=file");

        let result = std::fs::read_to_string(&self.path)
            .map_err(|source| FeedError::Io {
                path: self.path.clone(),
                source,
            })
            .and_then(|body| geojson::parse_feature_collection(&body));
        log_fetch_outcome("file", started_at, &result);
        result
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn log_fetch_outcome(source: &str, started_at: Instant, result: &FeedResult<Vec<Event>>) {
    match result {
        Ok(events) => info!(
            "event=feed_fetch module=feed status=ok source={} records={} duration_ms={}",
            source,
            events.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=feed_fetch module=feed status=error source={} duration_ms={} error={}",
            source,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{FeedError, FeedSource, FeedWindow, FileFeed};
    use std::io::Write;

    #[test]
    fn feed_window_maps_to_summary_url() {
        assert_eq!(
            FeedWindow::Month.url(),
            "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_month.geojson"
        );
        assert_eq!("DAY".parse::<FeedWindow>().unwrap(), FeedWindow::Day);
    }

    #[test]
    fn unknown_feed_window_lists_accepted_values() {
        let err = "year".parse::<FeedWindow>().unwrap_err();
        assert!(err.to_string().contains("hour|day|week|month"));
    }

    #[test]
    fn file_feed_reads_feature_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"features": [{{"id": "a", "properties": {{"mag": 2.0, "time": 1445122583000}}}}]}}"#
        )
        .unwrap();

        let events = FileFeed::new(file.path()).fetch().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "a");
    }

    #[test]
    fn missing_feed_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileFeed::new(dir.path().join("absent.geojson"))
            .fetch()
            .unwrap_err();
        assert!(matches!(err, FeedError::Io { .. }));
    }
}
