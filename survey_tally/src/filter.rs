use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::config::{Cell, Record, RowSet};

/// The gender selection of the dashboard.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GenderFilter {
    All,
    /// Only keep the rows with this value (compared after trimming and lower-casing).
    Only(String),
}

/// Inclusive on both ends.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start <= d && d <= self.end
    }
}

/// The user-provided filter state. Dates left unset are derived from the data.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterSettings {
    pub gender: GenderFilter,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FilterSettings {
    pub const NO_FILTER: FilterSettings = FilterSettings {
        gender: GenderFilter::All,
        start: None,
        end: None,
    };
}

/// The columns that the filters read.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterColumns {
    pub gender: String,
    pub submission_time: String,
}

/// Problems that do not stop the filtering but that should be shown to the viewer.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FilterWarning {
    /// The gender filter was ignored.
    MissingGenderColumn(String),
    /// The date filter was ignored.
    MissingDateColumn(String),
    /// No row has a valid submission date: the range defaults to the current date.
    NoValidDates,
}

#[derive(PartialEq, Debug, Clone)]
pub struct FilterOutcome {
    pub rows: RowSet,
    /// The range that was effectively applied.
    pub range: DateRange,
    pub warnings: Vec<FilterWarning>,
}

/// Parses the submission timestamp of a row into a calendar date.
///
/// The time of day is discarded. Timestamps with an offset give the date in that offset.
pub fn parse_submission_date(cell: &Cell) -> Option<NaiveDate> {
    let s = match cell {
        Cell::Text(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn record_date(r: &Record, column: &str) -> Option<NaiveDate> {
    parse_submission_date(r.get(column))
}

/// Keeps the rows of the selected gender.
///
/// If the gender column is absent, the filter does nothing and a warning is returned.
pub fn filter_gender(
    rows: &RowSet,
    column: &str,
    gender: &GenderFilter,
) -> (RowSet, Option<FilterWarning>) {
    match gender {
        GenderFilter::All => (rows.clone(), None),
        GenderFilter::Only(_) if !rows.has_column(column) => {
            warn!("filter_gender: column {:?} is absent, ignoring filter", column);
            (
                rows.clone(),
                Some(FilterWarning::MissingGenderColumn(column.to_string())),
            )
        }
        GenderFilter::Only(value) => {
            let target = value.trim().to_lowercase();
            let res = rows.select(|r| r.get(column).normalized().as_deref() == Some(target.as_str()));
            debug!(
                "filter_gender: {:?}: kept {} rows out of {}",
                value,
                res.len(),
                rows.len()
            );
            (res, None)
        }
    }
}

/// The smallest and largest valid submission dates, if any.
pub fn observed_date_bounds(rows: &RowSet, column: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for d in rows.records().iter().filter_map(|r| record_date(r, column)) {
        bounds = match bounds {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        };
    }
    bounds
}

/// Keeps the rows whose submission date is within the range. Rows without a valid
/// date are dropped.
pub fn filter_date_range(rows: &RowSet, column: &str, range: &DateRange) -> RowSet {
    rows.select(|r| match record_date(r, column) {
        Some(d) => range.contains(d),
        None => false,
    })
}

/// Applies the gender filter, then the date filter.
///
/// The default date bounds are computed on the gender-filtered rows. When no row
/// has a valid date, `today` is used for the missing bounds.
pub fn apply_filters(
    rows: &RowSet,
    columns: &FilterColumns,
    settings: &FilterSettings,
    today: NaiveDate,
) -> FilterOutcome {
    let mut warnings: Vec<FilterWarning> = Vec::new();

    let (by_gender, w) = filter_gender(rows, &columns.gender, &settings.gender);
    warnings.extend(w);

    if !by_gender.has_column(&columns.submission_time) {
        warn!(
            "apply_filters: column {:?} is absent, ignoring the date range",
            columns.submission_time
        );
        warnings.push(FilterWarning::MissingDateColumn(
            columns.submission_time.clone(),
        ));
        let range = DateRange {
            start: settings.start.unwrap_or(today),
            end: settings.end.unwrap_or(today),
        };
        return FilterOutcome {
            rows: by_gender,
            range,
            warnings,
        };
    }

    let (lo, hi) = match observed_date_bounds(&by_gender, &columns.submission_time) {
        Some(b) => b,
        None => {
            if settings.start.is_none() || settings.end.is_none() {
                warnings.push(FilterWarning::NoValidDates);
            }
            (today, today)
        }
    };
    let range = DateRange {
        start: settings.start.unwrap_or(lo),
        end: settings.end.unwrap_or(hi),
    };
    if range.start > range.end {
        warn!("apply_filters: empty date range {:?}", range);
    }

    let res = filter_date_range(&by_gender, &columns.submission_time, &range);
    info!(
        "apply_filters: {} rows, {} after gender filter, {} in {} - {}",
        rows.len(),
        by_gender.len(),
        res.len(),
        range.start,
        range.end
    );
    FilterOutcome {
        rows: res,
        range,
        warnings,
    }
}
