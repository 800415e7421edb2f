//! Plain-text and JSON rendering of ranked rows.

use super::RankedRow;

const REGION_HEADER: &str = "REGION";
const COUNT_HEADER: &str = "EARTHQUAKE COUNT";
const MAGNITUDE_HEADER: &str = "TOTAL MAGNITUDE";

/// Renders rows as a fixed-width table with a header line.
///
/// The region column is as wide as its longest entry; magnitudes use three
/// decimals.
pub fn render_table(rows: &[RankedRow]) -> String {
    let regions: Vec<String> = rows.iter().map(|row| row.region.to_string()).collect();
    let region_width = regions
        .iter()
        .map(|region| region.chars().count())
        .chain(std::iter::once(REGION_HEADER.len()))
        .max()
        .unwrap_or(REGION_HEADER.len());

    let mut out = format!(
        "{REGION_HEADER:<region_width$}  {COUNT_HEADER:>16}  {MAGNITUDE_HEADER:>15}\n"
    );
    for (row, region) in rows.iter().zip(&regions) {
        out.push_str(&format!(
            "{region:<region_width$}  {:>16}  {:>15.3}\n",
            row.event_count, row.aggregate_magnitude
        ));
    }
    out
}

/// Renders rows as a pretty-printed JSON array.
pub fn render_json(rows: &[RankedRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}

#[cfg(test)]
mod tests {
    use super::{render_json, render_table};
    use crate::region::RegionKey;
    use crate::report::RankedRow;

    fn rows() -> Vec<RankedRow> {
        vec![
            RankedRow {
                region: RegionKey::Name("Eielson Air Force Base, Alaska".to_string()),
                event_count: 3,
                aggregate_magnitude: 6.041392685158225,
            },
            RankedRow {
                region: RegionKey::Offset(-420),
                event_count: 1,
                aggregate_magnitude: 2.5,
            },
        ]
    }

    #[test]
    fn table_aligns_columns_to_longest_region() {
        let table = render_table(&rows());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("REGION "));
        assert!(lines[1].starts_with("Eielson Air Force Base, Alaska  "));
        assert!(lines[1].ends_with("6.041"));
        assert!(lines[2].starts_with("-420 "));
        assert_eq!(lines[1].len(), lines[2].len());
    }

    #[test]
    fn empty_report_renders_header_only() {
        assert_eq!(render_table(&[]).lines().count(), 1);
    }

    #[test]
    fn json_keeps_integer_regions_as_numbers() {
        let json = render_json(&rows()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[1]["region"], serde_json::json!(-420));
        assert_eq!(value[0]["event_count"], serde_json::json!(3));
    }
}
