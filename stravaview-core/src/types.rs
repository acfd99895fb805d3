//! Core domain types for stravaview
//!
//! These types describe the two shapes activity data takes on its way to a
//! chart: the loosely typed [`RawTable`] handed over by a data source, and the
//! typed, unit-consistent [`ActivityTable`] produced by normalization.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Raw table** | Columns of untyped cells exactly as a spreadsheet or CSV export returned them |
//! | **Canonical table** | Normalized records in kilometers, minutes and meters |
//! | **Display table** | A copy of the canonical table converted to the user's [`UnitSystem`] |
//! | **Metric column** | A numeric field of [`ActivityRecord`] addressable by its column name |
//! | **Dimension** | The physical quantity a column measures, which decides unit conversion |

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================
// Units
// ============================================

/// Kilometers to miles.
pub const KM_TO_MI: f64 = 0.621371;
/// Minutes per kilometer to minutes per mile.
pub const MIN_PER_KM_TO_MIN_PER_MI: f64 = 1.60934449789;
/// Meters to feet.
pub const M_TO_FT: f64 = 3.28084;

/// Unit system used for displaying values.
///
/// The canonical representation is always [`UnitSystem::Metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "imperial",
            UnitSystem::Metric => "metric",
        }
    }

    /// Convert a canonical (metric) value into this unit system.
    pub fn from_canonical(&self, dimension: Dimension, value: f64) -> f64 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => value * dimension.imperial_factor(),
        }
    }

    /// Convert a value expressed in this unit system back to canonical units.
    pub fn to_canonical(&self, dimension: Dimension, value: f64) -> f64 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => value / dimension.imperial_factor(),
        }
    }
}

impl std::str::FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imperial" => Ok(UnitSystem::Imperial),
            "metric" => Ok(UnitSystem::Metric),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical quantity measured by a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Distance,
    Duration,
    Elevation,
    Pace,
    Speed,
    HeartRate,
    Cadence,
    Effort,
}

impl Dimension {
    /// Multiplier from canonical units to imperial units.
    pub fn imperial_factor(&self) -> f64 {
        match self {
            Dimension::Distance | Dimension::Speed => KM_TO_MI,
            Dimension::Pace => MIN_PER_KM_TO_MIN_PER_MI,
            Dimension::Elevation => M_TO_FT,
            Dimension::Duration | Dimension::HeartRate | Dimension::Cadence | Dimension::Effort => {
                1.0
            }
        }
    }
}

// ============================================
// Raw table
// ============================================

/// A single untyped cell from a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Text form of the cell, if it has one.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawValue::Null
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        if value.is_empty() {
            RawValue::Null
        } else {
            RawValue::Text(value)
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// A named column of raw cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<RawValue>,
}

/// Tabular data as a source returned it: column name to ordered cells.
///
/// Column order follows the header row. Columns may have different lengths;
/// missing trailing cells read as [`RawValue::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<RawColumn>,
}

static NULL_CELL: RawValue = RawValue::Null;

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a header row and data rows.
    ///
    /// Short rows are padded with nulls; cells beyond the header are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<RawValue>>) -> Self {
        let mut columns: Vec<RawColumn> = headers
            .into_iter()
            .map(|name| RawColumn {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(RawValue::Null));
            }
        }

        Self { columns }
    }

    /// Append a column (builder style).
    pub fn with_column(mut self, name: &str, values: Vec<RawValue>) -> Self {
        self.columns.push(RawColumn {
            name: name.to_string(),
            values,
        });
        self
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Cells of the first column with this exact name.
    pub fn column(&self, name: &str) -> Option<&[RawValue]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Number of rows (length of the longest column).
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Cell lookup that treats out-of-range rows as null.
    pub fn cell<'a>(column: &'a [RawValue], row: usize) -> &'a RawValue {
        column.get(row).unwrap_or(&NULL_CELL)
    }
}

// ============================================
// Activities
// ============================================

/// Kind of activity.
///
/// The known variants are the ones the dashboard filters on; anything else
/// is kept verbatim in [`ActivityType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Run,
    Ride,
    Walk,
    Hike,
    Swim,
    Other(String),
}

impl ActivityType {
    /// Parse an activity type, accepting common aliases ("Bike" for Ride).
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "run" => ActivityType::Run,
            "ride" | "bike" => ActivityType::Ride,
            "walk" => ActivityType::Walk,
            "hike" => ActivityType::Hike,
            "swim" => ActivityType::Swim,
            _ => ActivityType::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Run => "Run",
            ActivityType::Ride => "Ride",
            ActivityType::Walk => "Walk",
            ActivityType::Hike => "Hike",
            ActivityType::Swim => "Swim",
            ActivityType::Other(s) => s,
        }
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        ActivityType::parse(&value)
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric fields of an [`ActivityRecord`], addressable by column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricColumn {
    Distance,
    ElapsedTime,
    ElevationGain,
    AverageHeartRate,
    AverageCadence,
    RelativeEffort,
    AverageSpeed,
    Pace,
}

impl MetricColumn {
    pub const ALL: [MetricColumn; 8] = [
        MetricColumn::Distance,
        MetricColumn::ElapsedTime,
        MetricColumn::ElevationGain,
        MetricColumn::AverageHeartRate,
        MetricColumn::AverageCadence,
        MetricColumn::RelativeEffort,
        MetricColumn::AverageSpeed,
        MetricColumn::Pace,
    ];

    /// Canonical column name (spaces already replaced by underscores).
    pub fn name(&self) -> &'static str {
        match self {
            MetricColumn::Distance => "Distance",
            MetricColumn::ElapsedTime => "Elapsed_Time",
            MetricColumn::ElevationGain => "Elevation_Gain",
            MetricColumn::AverageHeartRate => "Average_Heart_Rate",
            MetricColumn::AverageCadence => "Average_Cadence",
            MetricColumn::RelativeEffort => "Relative_Effort",
            MetricColumn::AverageSpeed => "Average_Speed",
            MetricColumn::Pace => "Pace",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            MetricColumn::Distance => Dimension::Distance,
            MetricColumn::ElapsedTime => Dimension::Duration,
            MetricColumn::ElevationGain => Dimension::Elevation,
            MetricColumn::AverageHeartRate => Dimension::HeartRate,
            MetricColumn::AverageCadence => Dimension::Cadence,
            MetricColumn::RelativeEffort => Dimension::Effort,
            MetricColumn::AverageSpeed => Dimension::Speed,
            MetricColumn::Pace => Dimension::Pace,
        }
    }
}

impl std::str::FromStr for MetricColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown metric column: {}", s))
    }
}

/// One normalized activity.
///
/// Numeric fields are either finite or `None`. Units depend on the
/// [`ActivityTable`] holding the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// When the activity started (`None` if the source cell was unparseable)
    pub activity_date: Option<NaiveDateTime>,
    pub activity_type: ActivityType,
    /// km (canonical) or mi
    pub distance: Option<f64>,
    /// Minutes in every unit system
    pub elapsed_time: Option<f64>,
    /// m (canonical) or ft
    pub elevation_gain: Option<f64>,
    pub average_heart_rate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub relative_effort: Option<f64>,
    /// Distance per minute
    pub average_speed: Option<f64>,
    /// Minutes per distance unit
    pub pace: Option<f64>,
}

impl ActivityRecord {
    pub fn value(&self, column: MetricColumn) -> Option<f64> {
        match column {
            MetricColumn::Distance => self.distance,
            MetricColumn::ElapsedTime => self.elapsed_time,
            MetricColumn::ElevationGain => self.elevation_gain,
            MetricColumn::AverageHeartRate => self.average_heart_rate,
            MetricColumn::AverageCadence => self.average_cadence,
            MetricColumn::RelativeEffort => self.relative_effort,
            MetricColumn::AverageSpeed => self.average_speed,
            MetricColumn::Pace => self.pace,
        }
    }

    fn value_mut(&mut self, column: MetricColumn) -> &mut Option<f64> {
        match column {
            MetricColumn::Distance => &mut self.distance,
            MetricColumn::ElapsedTime => &mut self.elapsed_time,
            MetricColumn::ElevationGain => &mut self.elevation_gain,
            MetricColumn::AverageHeartRate => &mut self.average_heart_rate,
            MetricColumn::AverageCadence => &mut self.average_cadence,
            MetricColumn::RelativeEffort => &mut self.relative_effort,
            MetricColumn::AverageSpeed => &mut self.average_speed,
            MetricColumn::Pace => &mut self.pace,
        }
    }

    /// Copy of this record with every numeric field passed through `f`.
    pub fn map_values(&self, f: impl Fn(MetricColumn, f64) -> f64) -> ActivityRecord {
        let mut out = self.clone();
        for column in MetricColumn::ALL {
            let slot = out.value_mut(column);
            *slot = slot.map(|v| f(column, v));
        }
        out
    }
}

/// Ordered, normalized activities in a single unit system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTable {
    units: UnitSystem,
    records: Vec<ActivityRecord>,
}

impl ActivityTable {
    pub fn new(units: UnitSystem, records: Vec<ActivityRecord>) -> Self {
        Self { units, records }
    }

    /// An empty table in canonical units.
    pub fn empty() -> Self {
        Self::new(UnitSystem::Metric, Vec::new())
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActivityRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column in row order.
    pub fn column(&self, column: MetricColumn) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.value(column)).collect()
    }

    /// First and last activity dates, ignoring undated rows.
    pub fn date_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut dates = self.records.iter().filter_map(|r| r.activity_date);
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some((min, max))
    }

    /// Calendar days covered by [`Self::date_range`].
    pub fn day_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.date_range().map(|(lo, hi)| (lo.date(), hi.date()))
    }

    /// A copy of this table expressed in `target` units.
    ///
    /// Values pass through canonical units, so converting back and forth
    /// never compounds factors.
    pub fn to_units(&self, target: UnitSystem) -> ActivityTable {
        if target == self.units {
            return self.clone();
        }
        let source = self.units;
        let records = self
            .records
            .iter()
            .map(|r| {
                r.map_values(|column, v| {
                    let dimension = column.dimension();
                    target.from_canonical(dimension, source.to_canonical(dimension, v))
                })
            })
            .collect();
        ActivityTable::new(target, records)
    }

    /// A new table holding the records that satisfy `keep`, in order.
    pub fn retain_where(&self, keep: impl Fn(&ActivityRecord) -> bool) -> ActivityTable {
        let records = self.records.iter().filter(|r| keep(r)).cloned().collect();
        ActivityTable::new(self.units, records)
    }
}

impl<'a> IntoIterator for &'a ActivityTable {
    type Item = &'a ActivityRecord;
    type IntoIter = std::slice::Iter<'a, ActivityRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
