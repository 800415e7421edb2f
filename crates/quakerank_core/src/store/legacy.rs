//! Import of the earlier two-file history layout.
//!
//! The old layout kept full GeoJSON features in `usgs_dump.json` and the seen
//! ids, one per line, in `earthquake_ids.txt`. Imported events go through the
//! normal merge path, so re-importing is a no-op.

use crate::feed::geojson::parse_feature_list;
use crate::feed::FeedError;
use crate::model::event::Event;
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const LEGACY_DUMP_FILE: &str = "usgs_dump.json";
pub const LEGACY_IDS_FILE: &str = "earthquake_ids.txt";

#[derive(Debug)]
pub enum LegacyImportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: FeedError,
    },
}

impl Display for LegacyImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read legacy file `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "legacy file `{}` is corrupt: {source}", path.display())
            }
        }
    }
}

impl Error for LegacyImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Events read from a legacy directory plus consistency counters.
#[derive(Debug)]
pub struct LegacyDump {
    pub events: Vec<Event>,
    /// Ids listed in the ids file without a matching feature.
    pub ids_without_feature: usize,
}

/// Reads the legacy dump in `dir`.
///
/// The feature file is required; the ids file is optional and only checked
/// for consistency, since the features carry their own ids.
pub fn read_legacy_dump(dir: &Path) -> Result<LegacyDump, LegacyImportError> {
    let dump_path = dir.join(LEGACY_DUMP_FILE);
    let body = std::fs::read_to_string(&dump_path).map_err(|source| LegacyImportError::Io {
        path: dump_path.clone(),
        source,
    })?;
    let events = parse_feature_list(&body).map_err(|source| LegacyImportError::Parse {
        path: dump_path.clone(),
        source,
    })?;

    let ids_path = dir.join(LEGACY_IDS_FILE);
    let ids_without_feature = match std::fs::read_to_string(&ids_path) {
        Ok(listing) => {
            let feature_ids: HashSet<&str> = events.iter().map(|event| event.id.as_str()).collect();
            listing
                .lines()
                .map(str::trim)
                .filter(|id| !id.is_empty() && !feature_ids.contains(id))
                .count()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => 0,
        Err(source) => {
            return Err(LegacyImportError::Io {
                path: ids_path,
                source,
            });
        }
    };

    if ids_without_feature > 0 {
        warn!(
            "event=legacy_import module=store status=inconsistent ids_without_feature={}",
            ids_without_feature
        );
    }
    info!(
        "event=legacy_import module=store status=ok features={}",
        events.len()
    );

    Ok(LegacyDump {
        events,
        ids_without_feature,
    })
}
