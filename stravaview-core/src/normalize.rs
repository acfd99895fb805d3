//! Data normalizer
//!
//! Turns a [`RawTable`] into a typed, chronologically ordered
//! [`ActivityTable`] in canonical units (kilometers, minutes, meters),
//! plus a display copy in the caller's [`UnitSystem`].
//!
//! ## Pipeline
//!
//! ```text
//! RawTable ──► canonical names ──► coerce cells ──► s→min, m→km
//!                                                       │
//!          display copy ◄── stable date sort ◄── speed & pace
//! ```
//!
//! Malformed cells become `None` and are only logged. The only failure is a
//! required column missing from the table entirely.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{ActivityRecord, ActivityTable, ActivityType, RawTable, RawValue, UnitSystem};

pub const ACTIVITY_DATE: &str = "Activity_Date";
pub const ACTIVITY_TYPE: &str = "Activity_Type";
pub const DISTANCE: &str = "Distance";
pub const ELAPSED_TIME: &str = "Elapsed_Time";
pub const ELEVATION_GAIN: &str = "Elevation_Gain";
pub const AVERAGE_HEART_RATE: &str = "Average_Heart_Rate";
pub const AVERAGE_CADENCE: &str = "Average_Cadence";
pub const RELATIVE_EFFORT: &str = "Relative_Effort";

/// Columns that must be present (after name canonicalization).
pub const REQUIRED_COLUMNS: &[&str] = &[
    ACTIVITY_DATE,
    ACTIVITY_TYPE,
    DISTANCE,
    ELAPSED_TIME,
    ELEVATION_GAIN,
];

const SECONDS_PER_MINUTE: f64 = 60.0;
const METERS_PER_KILOMETER: f64 = 1000.0;

const DATE_TIME_FORMATS: &[&str] = &[
    // Strava bulk export
    "%b %d, %Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y"];

/// Output of [`normalize`]: the canonical table and a display copy.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    canonical: ActivityTable,
    display: ActivityTable,
    stats: NormalizeStats,
}

impl NormalizedTable {
    /// Records in kilometers, minutes and meters.
    pub fn canonical(&self) -> &ActivityTable {
        &self.canonical
    }

    /// Records in the requested display units.
    pub fn display(&self) -> &ActivityTable {
        &self.display
    }

    pub fn units(&self) -> UnitSystem {
        self.display.units()
    }

    pub fn stats(&self) -> &NormalizeStats {
        &self.stats
    }

    /// Re-derive the display copy for other units from the canonical table.
    pub fn with_units(&self, units: UnitSystem) -> NormalizedTable {
        NormalizedTable {
            canonical: self.canonical.clone(),
            display: self.canonical.to_units(units),
            stats: self.stats.clone(),
        }
    }
}

/// Counters describing what normalization tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    /// Rows in the input table
    pub rows: usize,
    /// Non-empty cells that could not be parsed and were nulled
    pub nulled_cells: usize,
    /// Rows whose date could not be parsed
    pub undated_rows: usize,
    /// Optional columns that were absent from the input
    pub missing_optional_columns: Vec<String>,
    /// Headers ignored because an earlier column had the same canonical name
    pub duplicate_columns: Vec<String>,
}

/// Replace spaces with underscores so labels are usable as identifiers.
pub fn canonical_column_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Normalize a raw table and produce a display copy in `units`.
pub fn normalize(raw: &RawTable, units: UnitSystem) -> Result<NormalizedTable> {
    let (canonical, stats) = normalize_canonical(raw)?;
    let display = canonical.to_units(units);
    Ok(NormalizedTable {
        canonical,
        display,
        stats,
    })
}

/// Normalize a raw table into canonical units only.
pub fn normalize_canonical(raw: &RawTable) -> Result<(ActivityTable, NormalizeStats)> {
    let mut columns: HashMap<String, &[RawValue]> = HashMap::new();
    let mut duplicate_columns = Vec::new();
    for column in raw.columns() {
        match columns.entry(canonical_column_name(&column.name)) {
            Entry::Vacant(slot) => {
                slot.insert(column.values.as_slice());
            }
            Entry::Occupied(slot) => {
                tracing::warn!(
                    column = %column.name,
                    canonical = %slot.key(),
                    "Duplicate column ignored, keeping the first"
                );
                duplicate_columns.push(column.name.clone());
            }
        }
    }

    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(*required) {
            return Err(Error::Schema {
                column: (*required).to_string(),
            });
        }
    }

    let mut stats = NormalizeStats {
        rows: raw.row_count(),
        duplicate_columns,
        ..Default::default()
    };

    for optional in [AVERAGE_HEART_RATE, AVERAGE_CADENCE, RELATIVE_EFFORT] {
        if !columns.contains_key(optional) {
            tracing::debug!(column = optional, "Optional column absent, filling with nulls");
            stats.missing_optional_columns.push(optional.to_string());
        }
    }

    let col = |name: &str| columns.get(name).copied().unwrap_or(&[]);
    let dates = col(ACTIVITY_DATE);
    let types = col(ACTIVITY_TYPE);

    let mut records = Vec::with_capacity(stats.rows);
    for row in 0..stats.rows {
        let mut number = |name: &str| -> Option<f64> {
            let cell = RawTable::cell(col(name), row);
            let parsed = parse_number(cell);
            if parsed.is_none() && !cell.is_null() {
                tracing::debug!(row, column = name, cell = ?cell, "Unparseable cell set to null");
                stats.nulled_cells += 1;
            }
            parsed
        };

        let distance_m = number(DISTANCE);
        let elapsed_s = number(ELAPSED_TIME);
        let elevation_gain = number(ELEVATION_GAIN);
        let average_heart_rate = number(AVERAGE_HEART_RATE);
        let average_cadence = number(AVERAGE_CADENCE);
        let relative_effort = number(RELATIVE_EFFORT);

        let date_cell = RawTable::cell(dates, row);
        let activity_date = parse_date(date_cell);
        if activity_date.is_none() {
            if !date_cell.is_null() {
                tracing::debug!(row, cell = ?date_cell, "Unparseable activity date set to null");
                stats.nulled_cells += 1;
            }
            stats.undated_rows += 1;
        }

        let activity_type = RawTable::cell(types, row)
            .as_text()
            .map(|t| ActivityType::parse(&t))
            .unwrap_or_else(|| ActivityType::Other(String::new()));

        let distance = non_negative(distance_m).map(|m| m / METERS_PER_KILOMETER);
        let elapsed_time = non_negative(elapsed_s).map(|s| s / SECONDS_PER_MINUTE);
        let (average_speed, pace) = derived_rates(distance, elapsed_time);

        records.push(ActivityRecord {
            activity_date,
            activity_type,
            distance,
            elapsed_time,
            elevation_gain,
            average_heart_rate,
            average_cadence,
            relative_effort,
            average_speed,
            pace,
        });
    }

    sort_chronologically(&mut records);

    if stats.nulled_cells > 0 {
        tracing::warn!(
            rows = stats.rows,
            nulled_cells = stats.nulled_cells,
            "Some cells could not be parsed and were nulled"
        );
    }
    tracing::info!(
        rows = stats.rows,
        undated_rows = stats.undated_rows,
        "Normalized activity table"
    );

    Ok((ActivityTable::new(UnitSystem::Metric, records), stats))
}

/// Sort by activity date, keeping input order for ties; undated rows last.
pub fn sort_chronologically(records: &mut [ActivityRecord]) {
    // sort_by is stable
    records.sort_by(|a, b| match (a.activity_date, b.activity_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Average speed (distance/min) and pace (min/distance).
///
/// Both are `None` unless distance and time are both positive.
pub fn derived_rates(distance: Option<f64>, elapsed_time: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (distance, elapsed_time) {
        (Some(d), Some(t)) if d > 0.0 && t > 0.0 => {
            let speed = d / t;
            let pace = t / d;
            (
                speed.is_finite().then_some(speed),
                pace.is_finite().then_some(pace),
            )
        }
        _ => (None, None),
    }
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

/// Parse a numeric cell.
///
/// Commas are accepted only as thousands separators ("12,345.6"). Any
/// other comma, such as a decimal comma in "5,5", nulls the cell.
pub fn parse_number(cell: &RawValue) -> Option<f64> {
    let value = match cell {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => {
            let cleaned = strip_thousands_separators(s.trim())?;
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        RawValue::Null | RawValue::Bool(_) => return None,
    };
    value.is_finite().then_some(value)
}

fn strip_thousands_separators(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let unsigned = s.trim_start_matches(['+', '-']);
    let sign = &s[..s.len() - unsigned.len()];
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let mut groups = integer.split(',');
    let lead = groups.next()?;
    let digits = |g: &str| g.chars().all(|c| c.is_ascii_digit());
    if lead.is_empty() || lead.len() > 3 || !digits(lead) {
        return None;
    }
    let mut cleaned = format!("{}{}", sign, lead);
    for group in groups {
        if group.len() != 3 || !digits(group) {
            return None;
        }
        cleaned.push_str(group);
    }
    if let Some(fraction) = fraction {
        cleaned.push('.');
        cleaned.push_str(fraction);
    }
    Some(cleaned)
}

/// Parse a date cell.
///
/// Text is tried as RFC 3339, then the known date-time and date layouts.
/// Numbers are spreadsheet serial dates (days since 1899-12-30).
pub fn parse_date(cell: &RawValue) -> Option<NaiveDateTime> {
    match cell {
        RawValue::Text(s) => parse_date_text(s.trim()),
        RawValue::Number(n) => spreadsheet_serial_date(*n),
        RawValue::Null | RawValue::Bool(_) => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn spreadsheet_serial_date(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (days * 86_400.0).round();
    // Beyond i64 the cast would saturate; TimeDelta rejects the rest
    if seconds >= i64::MAX as f64 {
        return None;
    }
    epoch.checked_add_signed(Duration::try_seconds(seconds as i64)?)
}
