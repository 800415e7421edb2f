//! Aggregation and ranking pipeline.
//!
//! # Responsibility
//! - Select events inside the active time window.
//! - Group selected events by region and combine each region's magnitudes.
//! - Rank regions by combined magnitude and keep the top `N`.
//!
//! # Invariants
//! - Events without a region key contribute to no region and no count.
//! - Row order is descending by aggregate magnitude; ties keep the order in
//!   which regions first appeared.
//! - An empty selection yields an empty report, never an error.

pub mod render;

use crate::aggregate::{combine, AggregateError};
use crate::model::event::Event;
use crate::model::window::TimeWindow;
use crate::region::{RegionKey, RegionResolver};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// One ranked report line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub region: RegionKey,
    /// In-window events grouped under `region`.
    pub event_count: usize,
    /// `log10` of the summed linear energies of the region's magnitudes.
    pub aggregate_magnitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportError {
    Aggregate {
        region: RegionKey,
        source: AggregateError,
    },
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggregate { region, source } => {
                write!(f, "failed to aggregate region `{region}`: {source}")
            }
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Aggregate { source, .. } => Some(source),
        }
    }
}

/// Region → magnitudes, iterated in order of first appearance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegionGroups {
    order: Vec<RegionKey>,
    members: HashMap<RegionKey, Vec<Option<f64>>>,
}

impl RegionGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `magnitude` to `region`, registering the region on first use.
    pub fn push(&mut self, region: RegionKey, magnitude: Option<f64>) {
        if let Some(magnitudes) = self.members.get_mut(&region) {
            magnitudes.push(magnitude);
            return;
        }
        self.order.push(region.clone());
        self.members.insert(region, vec![magnitude]);
    }

    pub fn get(&self, region: &RegionKey) -> Option<&[Option<f64>]> {
        self.members.get(region).map(Vec::as_slice)
    }

    /// Number of distinct regions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn regions(&self) -> &[RegionKey] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionKey, &[Option<f64>])> + '_ {
        self.order.iter().filter_map(move |region| {
            self.members
                .get(region)
                .map(|magnitudes| (region, magnitudes.as_slice()))
        })
    }
}

/// Groups in-window events by region, preserving arrival order.
pub fn group_by_region<'e, I>(
    events: I,
    window: &TimeWindow,
    resolver: &RegionResolver<'_>,
) -> RegionGroups
where
    I: IntoIterator<Item = &'e Event>,
{
    let mut groups = RegionGroups::new();
    for event in events {
        if !window.contains(event.last_activity_at()) {
            continue;
        }
        if let Some(region) = resolver.region_key(event) {
            groups.push(region, event.magnitude);
        }
    }
    groups
}

/// Aggregates each region and returns the `top_n` most severe.
///
/// Regions whose members all lack a magnitude have no defined aggregate and
/// are left out of the ranking.
pub fn rank_regions(groups: &RegionGroups, top_n: usize) -> Result<Vec<RankedRow>, ReportError> {
    let mut rows = Vec::with_capacity(groups.len());
    for (region, magnitudes) in groups.iter() {
        match combine(magnitudes) {
            Ok(aggregate_magnitude) => rows.push(RankedRow {
                region: region.clone(),
                event_count: magnitudes.len(),
                aggregate_magnitude,
            }),
            Err(AggregateError::EmptyInput) => {
                warn!(
                    "event=report_rank module=report status=skipped reason=no_magnitude region={} events={}",
                    region,
                    magnitudes.len()
                );
            }
            Err(source) => {
                return Err(ReportError::Aggregate {
                    region: region.clone(),
                    source,
                });
            }
        }
    }

    // Stable sort: equal aggregates keep first-appearance order.
    rows.sort_by(|a, b| b.aggregate_magnitude.total_cmp(&a.aggregate_magnitude));
    rows.truncate(top_n);
    Ok(rows)
}

/// Runs window selection, grouping, aggregation and ranking.
pub fn build_report<'e, I>(
    events: I,
    window: &TimeWindow,
    resolver: &RegionResolver<'_>,
    top_n: usize,
) -> Result<Vec<RankedRow>, ReportError>
where
    I: IntoIterator<Item = &'e Event>,
{
    let started_at = Instant::now();
    let groups = group_by_region(events, window, resolver);
    let rows = rank_regions(&groups, top_n)?;
    info!(
        "event=report_build module=report status=ok mode={} regions={} rows={} duration_ms={}",
        resolver.mode(),
        groups.len(),
        rows.len(),
        started_at.elapsed().as_millis()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{rank_regions, RegionGroups};
    use crate::region::RegionKey;

    fn name(value: &str) -> RegionKey {
        RegionKey::Name(value.to_string())
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let mut groups = RegionGroups::new();
        groups.push(name("b"), Some(1.0));
        groups.push(name("a"), Some(2.0));
        groups.push(name("b"), Some(3.0));

        assert_eq!(groups.regions(), &[name("b"), name("a")]);
        assert_eq!(groups.get(&name("b")), Some(&[Some(1.0), Some(3.0)][..]));
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let mut groups = RegionGroups::new();
        groups.push(name("first"), Some(4.0));
        groups.push(name("second"), Some(4.0));
        groups.push(name("bigger"), Some(5.0));

        let rows = rank_regions(&groups, 10).unwrap();
        let order: Vec<String> = rows.iter().map(|row| row.region.to_string()).collect();
        assert_eq!(order, vec!["bigger", "first", "second"]);
    }

    #[test]
    fn count_includes_members_without_magnitude() {
        let mut groups = RegionGroups::new();
        groups.push(name("a"), None);
        groups.push(name("a"), Some(3.0));

        let rows = rank_regions(&groups, 10).unwrap();
        assert_eq!(rows[0].event_count, 2);
        assert_eq!(rows[0].aggregate_magnitude, 3.0);
    }

    #[test]
    fn region_without_any_magnitude_is_left_out() {
        let mut groups = RegionGroups::new();
        groups.push(name("silent"), None);
        groups.push(name("loud"), Some(2.0));

        let rows = rank_regions(&groups, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, name("loud"));
    }

    #[test]
    fn non_finite_magnitude_aborts_ranking() {
        let mut groups = RegionGroups::new();
        groups.push(name("bad"), Some(f64::NAN));

        let err = rank_regions(&groups, 10).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}
