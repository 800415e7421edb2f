//! Analyzer use-case service.
//!
//! # Responsibility
//! - Run one ingest → merge → persist → report cycle.
//! - Fold legacy history into the same merge and persist.
//!
//! # Invariants
//! - Configuration is validated before any I/O.
//! - Every input is read before anything is merged; a feed or legacy read
//!   failure leaves storage untouched.
//! - Storage is written at most once per run, and only when the merge
//!   accepted new events.

use crate::config::{AnalyzerConfig, ConfigError};
use crate::db::DbError;
use crate::feed::{FeedError, FeedSource};
use crate::model::window::TimeWindow;
use crate::region::geocode::{GeocodeError, ReverseGeocoder};
use crate::region::RegionResolver;
use crate::repo::event_repo::{EventRepository, RepoError};
use crate::report::{build_report, RankedRow, ReportError};
use crate::store::event_store::EventStore;
use crate::store::legacy::{read_legacy_dump, LegacyImportError};
use chrono::{DateTime, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type RunResult<T> = Result<T, RunError>;

/// Any failure that aborts a run.
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
    Feed(FeedError),
    Geocode(GeocodeError),
    Legacy(LegacyImportError),
    Report(ReportError),
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "event store error: {err}"),
            Self::Feed(err) => write!(f, "feed error: {err}"),
            Self::Geocode(err) => write!(f, "geocoder error: {err}"),
            Self::Legacy(err) => write!(f, "legacy import error: {err}"),
            Self::Report(err) => write!(f, "report error: {err}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Feed(err) => Some(err),
            Self::Geocode(err) => Some(err),
            Self::Legacy(err) => Some(err),
            Self::Report(err) => Some(err),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for RunError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for RunError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<FeedError> for RunError {
    fn from(value: FeedError) -> Self {
        Self::Feed(value)
    }
}

impl From<GeocodeError> for RunError {
    fn from(value: GeocodeError) -> Self {
        Self::Geocode(value)
    }
}

impl From<LegacyImportError> for RunError {
    fn from(value: LegacyImportError) -> Self {
        Self::Legacy(value)
    }
}

impl From<ReportError> for RunError {
    fn from(value: ReportError) -> Self {
        Self::Report(value)
    }
}

/// Outcome of one analyzer run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Records returned by the feed.
    pub fetched: usize,
    /// Records read from the legacy directory (0 without one).
    pub legacy_read: usize,
    /// Records accepted as new by the merge.
    pub accepted: usize,
    /// Rows written to storage (0 when nothing changed).
    pub persisted: usize,
    /// Events in the store after the merge.
    pub total_events: usize,
    pub rows: Vec<RankedRow>,
}

/// Use-case service over an event repository and a feed.
pub struct AnalyzerService<R: EventRepository, F: FeedSource> {
    repo: R,
    feed: F,
    config: AnalyzerConfig,
    geocoder: Option<Box<dyn ReverseGeocoder>>,
    legacy_dir: Option<PathBuf>,
}

impl<R: EventRepository, F: FeedSource> AnalyzerService<R, F> {
    /// Creates a service after validating `config`.
    pub fn new(repo: R, feed: F, config: AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            repo,
            feed,
            config,
            geocoder: None,
            legacy_dir: None,
        })
    }

    /// Attaches the reverse geocoder used by geocoded region modes.
    pub fn with_geocoder(mut self, geocoder: Box<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Merges the legacy two-file history in `dir` ahead of the feed batch on
    /// every run. Already known ids are skipped, so repeat runs are no-ops.
    pub fn with_legacy_import(mut self, dir: impl AsRef<Path>) -> Self {
        self.legacy_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs one cycle and returns the ranked report for the window ending at `now`.
    pub fn run(&self, now: DateTime<Utc>) -> RunResult<RunSummary> {
        let started_at = Instant::now();
        let geocoder = self
            .geocoder
            .as_deref()
            .map(|geocoder| geocoder as &dyn ReverseGeocoder);
        let resolver = RegionResolver::with_geocoder(self.config.region_mode, geocoder)?;

        let mut store = EventStore::load(&self.repo)?;
        let legacy = match &self.legacy_dir {
            Some(dir) => read_legacy_dump(dir)?.events,
            None => Vec::new(),
        };
        let batch = self.feed.fetch()?;
        let legacy_read = legacy.len();
        let fetched = batch.len();

        let before = store.len();
        store.merge_new(legacy);
        store.merge_new(batch);
        let persisted = store.persist(&self.repo)?;
        let accepted = store.len() - before;

        let window = TimeWindow::trailing_days(now, self.config.window_days);
        let rows = build_report(
            store.events(),
            &window,
            &resolver,
            self.config.top_regions,
        )?;

        info!(
            "event=analyzer_run module=service status=ok feed={} fetched={} legacy_read={} accepted={} persisted={} total={} rows={} duration_ms={}",
            self.feed.describe(),
            fetched,
            legacy_read,
            accepted,
            persisted,
            store.len(),
            rows.len(),
            started_at.elapsed().as_millis()
        );

        Ok(RunSummary {
            fetched,
            legacy_read,
            accepted,
            persisted,
            total_events: store.len(),
            rows,
        })
    }
}
