//! Core domain logic for quakerank.
//! Feed ingestion, the deduplicated event history, region grouping and the
//! ranked energy report all live here; the CLI only wires them together.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod region;
pub mod repo;
pub mod report;
pub mod service;
pub mod store;

pub use aggregate::{combine, combine_present, AggregateError};
pub use config::{AnalyzerConfig, ConfigError, FeedSelection};
pub use db::{open_db, open_db_in_memory, DbError};
pub use feed::{FeedError, FeedSource, FeedWindow, FileFeed, UsgsFeed};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{Event, EventId, EventValidationError};
pub use model::window::TimeWindow;
pub use region::geocode::{Granularity, MapQuestGeocoder, ReverseGeocoder};
pub use region::{RegionKey, RegionMode, RegionResolver};
pub use repo::event_repo::{EventRepository, RepoError, RepoResult, SqliteEventRepository};
pub use report::render::{render_json, render_table};
pub use report::{build_report, group_by_region, rank_regions, RankedRow, ReportError};
pub use service::analyzer_service::{AnalyzerService, RunError, RunSummary};
pub use store::event_store::EventStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
