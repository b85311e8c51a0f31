//! Totals and scalar metrics over the filtered submissions.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::debug;

use crate::config::{Computed, FrequencyTable, RowSet};
use crate::filter::{observed_date_bounds, parse_submission_date};

/// The columns of the coverage table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoverageColumns {
    /// First level of grouping (administrative area).
    pub area: String,
    /// Second level of grouping (health facility).
    pub facility: String,
    pub worker: String,
    pub sub_area: String,
}

/// Distinct counts for one (area, facility) group.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoverageRow {
    pub area: String,
    pub facility: String,
    pub workers: u64,
    pub sub_areas: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoverageSummary {
    /// Sorted by area, then by facility.
    pub groups: Vec<CoverageRow>,
    /// Blank grouping cells, column-wise sums of the groups.
    pub total: CoverageRow,
}

#[derive(Debug, Default)]
struct GroupSets {
    workers: HashSet<String>,
    sub_areas: HashSet<String>,
}

/// Groups the rows by area and facility and counts the distinct workers and
/// sub-areas of each group.
///
/// Rows without an area or a facility are not part of any group. Missing workers
/// or sub-areas are not counted.
pub fn coverage_summary(rows: &RowSet, cols: &CoverageColumns) -> Computed<CoverageSummary> {
    Computed::require(
        rows,
        &[
            cols.area.as_str(),
            cols.facility.as_str(),
            cols.worker.as_str(),
            cols.sub_area.as_str(),
        ],
        || {
            let mut groups: BTreeMap<(String, String), GroupSets> = BTreeMap::new();
            for r in rows.records() {
                let key = match (r.get(&cols.area).label(), r.get(&cols.facility).label()) {
                    (Some(a), Some(f)) => (a, f),
                    _ => continue,
                };
                let g = groups.entry(key).or_default();
                if let Some(w) = r.get(&cols.worker).label() {
                    g.workers.insert(w);
                }
                if let Some(s) = r.get(&cols.sub_area).label() {
                    g.sub_areas.insert(s);
                }
            }
            let groups: Vec<CoverageRow> = groups
                .into_iter()
                .map(|((area, facility), sets)| CoverageRow {
                    area,
                    facility,
                    workers: sets.workers.len() as u64,
                    sub_areas: sets.sub_areas.len() as u64,
                })
                .collect();
            let total = CoverageRow {
                area: String::new(),
                facility: String::new(),
                workers: groups.iter().map(|g| g.workers).sum(),
                sub_areas: groups.iter().map(|g| g.sub_areas).sum(),
            };
            debug!("coverage_summary: {} groups, total {:?}", groups.len(), total);
            CoverageSummary { groups, total }
        },
    )
}

/// The number of distinct non-null values in a column.
pub fn distinct_count(rows: &RowSet, column: &str) -> Computed<u64> {
    Computed::require(rows, &[column], || {
        let values: HashSet<String> = rows
            .records()
            .iter()
            .filter_map(|r| r.get(column).label())
            .collect();
        values.len() as u64
    })
}

/// Number of submissions per date, in ascending date order. Rows without a
/// valid date are not counted.
pub fn submission_trend(rows: &RowSet, date_column: &str) -> Computed<FrequencyTable> {
    Computed::require(rows, &[date_column], || {
        let mut per_day: BTreeMap<chrono::NaiveDate, u64> = BTreeMap::new();
        for d in rows
            .records()
            .iter()
            .filter_map(|r| parse_submission_date(r.get(date_column)))
        {
            *per_day.entry(d).or_insert(0) += 1;
        }
        let mut res = FrequencyTable::new();
        for (d, c) in per_day {
            res.add(&d.format("%Y-%m-%d").to_string(), c);
        }
        res
    })
}

/// The observed date range of the submissions, as `start - end`.
pub fn date_range_label(rows: &RowSet, date_column: &str) -> Option<String> {
    observed_date_bounds(rows, date_column).map(|(lo, hi)| format!("{} - {}", lo, hi))
}

/// The share of the expected units that appear in the data, as a percentage.
///
/// The expected number is not a property of the data and has to be configured.
pub fn completion_rate(observed: u64, expected: u64) -> Option<f64> {
    if expected == 0 {
        None
    } else {
        Some(100.0 * observed as f64 / expected as f64)
    }
}

/// The distinct values of a column, in sorted order.
pub fn distinct_values(rows: &RowSet, column: &str) -> Vec<String> {
    let values: BTreeSet<String> = rows
        .records()
        .iter()
        .filter_map(|r| r.get(column).label())
        .collect();
    values.into_iter().collect()
}
