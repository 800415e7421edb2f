//! Command-line entry point.
//!
//! # Responsibility
//! - Turn flags into a validated `AnalyzerConfig` before any I/O.
//! - Wire storage, feed and geocoder into one analyzer run and print the report.

use chrono::Utc;
use clap::{Parser, ValueEnum};
use log::error;
use quakerank_core::config::{
    DEFAULT_DB_PATH, DEFAULT_HTTP_TIMEOUT, DEFAULT_TOP_REGIONS, DEFAULT_WINDOW_DAYS,
};
use quakerank_core::feed::FeedWindow;
use quakerank_core::service::analyzer_service::RunError;
use quakerank_core::{
    init_logging, open_db, render_json, render_table, AnalyzerConfig, AnalyzerService,
    FeedSelection, FeedSource, FileFeed, MapQuestGeocoder, RankedRow, RegionMode,
    SqliteEventRepository, UsgsFeed,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "quakerank")]
#[command(version)]
#[command(about = "Rank regions by combined earthquake energy", long_about = None)]
struct Cli {
    /// Trailing window length in days
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
    days: u32,

    /// Grouping: timezone, network, place, country, state or city
    #[arg(long, default_value = "place")]
    region_type: String,

    /// Number of regions to report
    #[arg(long, default_value_t = DEFAULT_TOP_REGIONS)]
    num_regions: usize,

    /// SQLite history file
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// USGS summary window (hour, day, week, month) or a GeoJSON feed URL
    #[arg(long, default_value = "month", conflicts_with = "feed_file")]
    feed: String,

    /// Read the feed from a local GeoJSON file instead of HTTP
    #[arg(long)]
    feed_file: Option<PathBuf>,

    /// Merge a legacy usgs_dump.json/earthquake_ids.txt directory into this run
    #[arg(long)]
    import_legacy: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// HTTP timeout for feed and geocoder requests
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Absolute directory for rolling log files; logs go to stderr when unset
    #[arg(long)]
    log_dir: Option<String>,

    /// MapQuest key for country/state/city grouping
    #[arg(long, env = "MAPQUEST_API_KEY", hide_env_values = true)]
    mapquest_api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("quakerank: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&cli.log_level, cli.log_dir.as_deref()) {
        eprintln!("quakerank: {err}");
        return ExitCode::FAILURE;
    }

    let rows = match run(&cli, config) {
        Ok(rows) => rows,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={}", err);
            eprintln!("quakerank: {err}");
            return ExitCode::FAILURE;
        }
    };

    match cli.format {
        OutputFormat::Table => print!("{}", render_table(&rows)),
        OutputFormat::Json => match render_json(&rows) {
            Ok(body) => println!("{body}"),
            Err(err) => {
                eprintln!("quakerank: failed to render report: {err}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn build_config(cli: &Cli) -> Result<AnalyzerConfig, RunError> {
    let region_mode: RegionMode = cli.region_type.parse()?;
    let feed = match &cli.feed_file {
        Some(path) => FeedSelection::File(path.clone()),
        None if cli.feed.starts_with("http://") || cli.feed.starts_with("https://") => {
            FeedSelection::Url(cli.feed.clone())
        }
        None => FeedSelection::Usgs(cli.feed.parse::<FeedWindow>()?),
    };

    let config = AnalyzerConfig {
        window_days: cli.days,
        region_mode,
        top_regions: cli.num_regions,
        db_path: cli.db.clone(),
        feed,
        http_timeout: Duration::from_secs(cli.timeout_secs),
        geocoder_key: cli.mapquest_api_key.clone(),
    };
    config.validate()?;
    Ok(config)
}

fn build_feed(config: &AnalyzerConfig) -> Result<Box<dyn FeedSource>, RunError> {
    let feed: Box<dyn FeedSource> = match &config.feed {
        FeedSelection::Usgs(window) => Box::new(UsgsFeed::for_window(*window, config.http_timeout)?),
        FeedSelection::Url(url) => Box::new(UsgsFeed::new(url.clone(), config.http_timeout)?),
        FeedSelection::File(path) => Box::new(FileFeed::new(path)),
    };
    Ok(feed)
}

fn run(cli: &Cli, config: AnalyzerConfig) -> Result<Vec<RankedRow>, RunError> {
    let conn = open_db(&config.db_path)?;
    let repo = SqliteEventRepository::try_new(&conn)?;
    let feed = build_feed(&config)?;

    let geocoder = match (config.region_mode.granularity(), &config.geocoder_key) {
        (Some(_), Some(key)) => Some(MapQuestGeocoder::new(key.clone(), config.http_timeout)?),
        _ => None,
    };

    let mut service = AnalyzerService::new(repo, feed, config)?;
    if let Some(geocoder) = geocoder {
        service = service.with_geocoder(Box::new(geocoder));
    }

    if let Some(dir) = &cli.import_legacy {
        service = service.with_legacy_import(dir);
    }

    let summary = service.run(Utc::now())?;
    if cli.import_legacy.is_some() {
        eprintln!(
            "read {} legacy events; {} new events stored",
            summary.legacy_read, summary.persisted
        );
    }
    Ok(summary.rows)
}
