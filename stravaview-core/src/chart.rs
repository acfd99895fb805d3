//! Chart spec builder
//!
//! Turns a normalized [`ActivityTable`] plus the user's metric selection into
//! a renderer-agnostic [`ChartSpec`]. Two chart shapes exist:
//!
//! - **Multi-series**: one line per selected metric over activity date, each
//!   with a dashed trend overlay. Axis placement comes from
//!   [`axis_for`](crate::metrics::axis_for).
//! - **Comparison**: one metric plotted against another as a scatter, with a
//!   trend overlay and per-point tooltips.
//!
//! When there is nothing to draw, the builder returns a sentinel spec
//! carrying the prompt the renderer should show instead of a chart.

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics::{axis_for, Axis, MetricDescriptor, MetricRegistry};
use crate::trend::{Lowess, TrendSmoother};
use crate::types::{ActivityTable, UnitSystem};

pub const EMPTY_MESSAGE: &str = "Widen the date range to select some activities!";
pub const NO_SELECTION_MESSAGE: &str = "Choose some options to explore!";

const TREND_WIDTH: f32 = 4.0;
const DATA_WIDTH: f32 = 2.0;
const TOOLTIP_DATE_FORMAT: &str = "%b %d, %Y";

/// A chart to render, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    Chart(Chart),
    /// The filtered table has no activities
    Empty { message: String },
    /// No metric was selected
    NoSelection { message: String },
}

impl ChartSpec {
    pub fn empty() -> Self {
        ChartSpec::Empty {
            message: EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn no_selection() -> Self {
        ChartSpec::NoSelection {
            message: NO_SELECTION_MESSAGE.to_string(),
        }
    }

    pub fn chart(&self) -> Option<&Chart> {
        match self {
            ChartSpec::Chart(chart) => Some(chart),
            _ => None,
        }
    }

    /// Prompt text for sentinel specs.
    pub fn message(&self) -> Option<&str> {
        match self {
            ChartSpec::Chart(_) => None,
            ChartSpec::Empty { message } | ChartSpec::NoSelection { message } => Some(message),
        }
    }
}

/// Series and layout of a renderable chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub series: Vec<Series>,
    pub layout: Layout,
}

impl Chart {
    pub fn data_series(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| s.role == SeriesRole::Data)
    }

    pub fn trend_series(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| s.role == SeriesRole::Trend)
    }

    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesRole {
    Data,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMode {
    Lines,
    Markers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dash {
    Solid,
    Dash,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineStyle {
    pub dash: Dash,
    pub width: f32,
}

impl LineStyle {
    pub fn solid() -> Self {
        Self {
            dash: Dash::Solid,
            width: DATA_WIDTH,
        }
    }

    pub fn trend() -> Self {
        Self {
            dash: Dash::Dash,
            width: TREND_WIDTH,
        }
    }
}

/// X coordinates of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XValues {
    Dates(Vec<NaiveDateTime>),
    Numbers(Vec<f64>),
}

impl XValues {
    pub fn len(&self) -> usize {
        match self {
            XValues::Dates(v) => v.len(),
            XValues::Numbers(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One plotted series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub role: SeriesRole,
    pub mode: SeriesMode,
    pub axis: Axis,
    pub x: XValues,
    /// `None` marks a gap
    pub y: Vec<Option<f64>>,
    pub line: LineStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltips: Option<Vec<String>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Last non-null y value.
    pub fn last_value(&self) -> Option<f64> {
        self.y.iter().rev().find_map(|v| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoverMode {
    /// Unified hover across series at the same x
    X,
    Closest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub hover_mode: HoverMode,
    pub show_legend: bool,
    /// Whether a secondary y axis is drawn
    pub secondary_y: bool,
}

/// Builds chart specs, smoothing trends with `S`.
#[derive(Debug, Clone)]
pub struct ChartBuilder<S = Lowess> {
    smoother: S,
}

impl Default for ChartBuilder<Lowess> {
    fn default() -> Self {
        Self::new(Lowess::default())
    }
}

impl<S: TrendSmoother> ChartBuilder<S> {
    pub fn new(smoother: S) -> Self {
        Self { smoother }
    }

    pub fn smoother(&self) -> &S {
        &self.smoother
    }

    /// One line per label over activity date, each with a trend overlay.
    ///
    /// Returns [`ChartSpec::Empty`] for an empty table and
    /// [`ChartSpec::NoSelection`] for no labels (empty wins).
    pub fn multi_series<L: AsRef<str>>(
        &self,
        table: &ActivityTable,
        labels: &[L],
        registry: &MetricRegistry,
    ) -> Result<ChartSpec> {
        if table.is_empty() {
            return Ok(ChartSpec::empty());
        }
        if labels.is_empty() {
            return Ok(ChartSpec::no_selection());
        }

        let dated: Vec<_> = table
            .iter()
            .filter_map(|r| r.activity_date.map(|d| (d, r)))
            .collect();
        let dates: Vec<NaiveDateTime> = dated.iter().map(|(d, _)| *d).collect();

        let mut series = Vec::with_capacity(labels.len() * 2);
        for label in labels {
            let label = label.as_ref();
            let metric = registry.resolve(label)?;
            let axis = axis_for(label);

            let values: Vec<Option<f64>> = dated.iter().map(|(_, r)| r.value(metric.column)).collect();
            let points: Vec<(f64, f64)> = dates
                .iter()
                .zip(&values)
                .filter_map(|(d, v)| v.map(|v| (date_to_x(*d), v)))
                .collect();

            let curve = self.smoother.smooth(&points);
            let (trend_x, trend_y): (Vec<NaiveDateTime>, Vec<Option<f64>>) = curve
                .into_iter()
                .filter_map(|(x, y)| x_to_date(x).map(|d| (d, Some(y))))
                .unzip();

            series.push(Series {
                name: label.to_string(),
                role: SeriesRole::Data,
                mode: SeriesMode::Lines,
                axis,
                x: XValues::Dates(dates.clone()),
                y: values,
                line: LineStyle::solid(),
                tooltips: None,
            });
            series.push(Series {
                name: format!("{} trend", label),
                role: SeriesRole::Trend,
                mode: SeriesMode::Lines,
                axis,
                x: XValues::Dates(trend_x),
                y: trend_y,
                line: LineStyle::trend(),
                tooltips: None,
            });
        }

        tracing::debug!(
            labels = labels.len(),
            rows = dated.len(),
            smoother = self.smoother.name(),
            "Built multi-series chart"
        );

        Ok(ChartSpec::Chart(Chart {
            series,
            layout: Layout {
                x_title: None,
                y_title: None,
                hover_mode: HoverMode::X,
                show_legend: true,
                secondary_y: true,
            },
        }))
    }

    /// Scatter of the second label against the first, with a trend overlay.
    ///
    /// Fails with [`Error::Arity`] unless exactly two labels are given.
    pub fn comparison<L: AsRef<str>>(
        &self,
        table: &ActivityTable,
        labels: &[L],
        units: UnitSystem,
        registry: &MetricRegistry,
    ) -> Result<ChartSpec> {
        if labels.len() != 2 {
            return Err(Error::Arity {
                expected: 2,
                got: labels.len(),
            });
        }
        let x_metric = registry.resolve(labels[0].as_ref())?;
        let y_metric = registry.resolve(labels[1].as_ref())?;

        if table.is_empty() {
            return Ok(ChartSpec::empty());
        }

        let table = table.to_units(units);
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut tooltips = Vec::new();
        for record in table.iter() {
            if let (Some(x), Some(y)) = (record.value(x_metric.column), record.value(y_metric.column)) {
                let on = record
                    .activity_date
                    .map(|d| d.format(TOOLTIP_DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "unknown date".to_string());
                tooltips.push(format!(
                    "{} at {}\nOn: {}",
                    x_metric.format_value(x, units),
                    y_metric.format_value(y, units),
                    on
                ));
                xs.push(x);
                ys.push(y);
            }
        }

        let points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        let curve = self.smoother.smooth(&points);
        let trend_tooltips = curve
            .iter()
            .map(|(x, y)| trend_tooltip(x_metric, y_metric, *x, *y, units))
            .collect();
        let (trend_x, trend_y): (Vec<f64>, Vec<Option<f64>>) =
            curve.into_iter().map(|(x, y)| (x, Some(y))).unzip();

        tracing::debug!(
            x = x_metric.label,
            y = y_metric.label,
            points = xs.len(),
            "Built comparison chart"
        );

        let series = vec![
            Series {
                name: format!("{} vs {}", y_metric.title, x_metric.title),
                role: SeriesRole::Data,
                mode: SeriesMode::Markers,
                axis: Axis::Primary,
                x: XValues::Numbers(xs),
                y: ys.into_iter().map(Some).collect(),
                line: LineStyle::solid(),
                tooltips: Some(tooltips),
            },
            Series {
                name: format!("{} trend", y_metric.title),
                role: SeriesRole::Trend,
                mode: SeriesMode::Lines,
                axis: Axis::Primary,
                x: XValues::Numbers(trend_x),
                y: trend_y,
                line: LineStyle::trend(),
                tooltips: Some(trend_tooltips),
            },
        ];

        Ok(ChartSpec::Chart(Chart {
            series,
            layout: Layout {
                x_title: Some(x_metric.axis_title(units)),
                y_title: Some(y_metric.axis_title(units)),
                hover_mode: HoverMode::Closest,
                show_legend: false,
                secondary_y: false,
            },
        }))
    }
}

/// Multi-series chart with the default LOWESS smoother.
pub fn build_multi_series_spec<L: AsRef<str>>(
    table: &ActivityTable,
    labels: &[L],
    registry: &MetricRegistry,
) -> Result<ChartSpec> {
    ChartBuilder::<Lowess>::default().multi_series(table, labels, registry)
}

/// Comparison chart with the default LOWESS smoother.
pub fn build_comparison_spec<L: AsRef<str>>(
    table: &ActivityTable,
    labels: &[L],
    units: UnitSystem,
    registry: &MetricRegistry,
) -> Result<ChartSpec> {
    ChartBuilder::<Lowess>::default().comparison(table, labels, units, registry)
}

fn trend_tooltip(
    x_metric: &MetricDescriptor,
    y_metric: &MetricDescriptor,
    x: f64,
    y: f64,
    units: UnitSystem,
) -> String {
    format!(
        "Trend: {} for {}",
        y_metric.format_value(y, units),
        x_metric.format_value(x, units)
    )
}

fn date_to_x(date: NaiveDateTime) -> f64 {
    date.and_utc().timestamp() as f64
}

fn x_to_date(x: f64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(x.round() as i64, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityRecord, ActivityType};
    use chrono::NaiveDate;

    fn record(day: u32, distance: f64, pace: f64) -> ActivityRecord {
        ActivityRecord {
            activity_date: NaiveDate::from_ymd_opt(2021, 1, day).and_then(|d| d.and_hms_opt(7, 0, 0)),
            activity_type: ActivityType::Run,
            distance: Some(distance),
            elapsed_time: Some(distance * pace),
            elevation_gain: Some(40.0 + day as f64),
            average_heart_rate: Some(140.0 + day as f64),
            average_cadence: Some(170.0),
            relative_effort: if day % 2 == 0 { Some(30.0) } else { None },
            average_speed: Some(1.0 / pace),
            pace: Some(pace),
        }
    }

    fn table() -> ActivityTable {
        ActivityTable::new(
            UnitSystem::Metric,
            (1..=10)
                .map(|d| record(d, 4.0 + d as f64 * 0.5, 6.0 - d as f64 * 0.05))
                .collect(),
        )
    }

    #[test]
    fn test_empty_table_sentinel() {
        let registry = MetricRegistry::standard();
        let spec = build_multi_series_spec(&ActivityTable::empty(), &["Dist"], &registry).unwrap();
        assert_eq!(spec, ChartSpec::empty());
        assert_eq!(spec.message(), Some(EMPTY_MESSAGE));

        // Empty table wins over empty selection
        let none: [&str; 0] = [];
        let spec = build_multi_series_spec(&ActivityTable::empty(), &none, &registry).unwrap();
        assert_eq!(spec, ChartSpec::empty());
    }

    #[test]
    fn test_no_selection_sentinel() {
        let none: [&str; 0] = [];
        let spec = build_multi_series_spec(&table(), &none, &MetricRegistry::standard()).unwrap();
        assert_eq!(spec, ChartSpec::no_selection());
        assert_eq!(spec.message(), Some(NO_SELECTION_MESSAGE));
        assert!(spec.chart().is_none());
    }

    #[test]
    fn test_multi_series_counts_and_axes() {
        let labels = ["Dist", "Vert", "Avg. Pace", "Avg. HR", "Rel. Effort", "Avg. Cadence"];
        let spec = build_multi_series_spec(&table(), &labels, &MetricRegistry::standard()).unwrap();
        let chart = spec.chart().expect("chart");

        assert_eq!(chart.series.len(), 12);
        assert_eq!(chart.data_series().count(), 6);
        assert_eq!(chart.trend_series().count(), 6);

        for label in labels {
            let data = chart.series_named(label).unwrap();
            let trend = chart.series_named(&format!("{} trend", label)).unwrap();
            let expected = if label == "Vert" || label == "Avg. HR" {
                Axis::Primary
            } else {
                Axis::Secondary
            };
            assert_eq!(data.axis, expected, "{}", label);
            assert_eq!(trend.axis, expected, "{}", label);
            assert_eq!(data.line.dash, Dash::Solid);
            assert_eq!(trend.line, LineStyle::trend());
            assert_eq!(data.len(), 10);
        }

        // Series follow selection order, each trailed by its trend
        let names: Vec<&str> = chart.series.iter().take(4).map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Dist", "Dist trend", "Vert", "Vert trend"]);
        assert!(chart.layout.show_legend);
        assert_eq!(chart.layout.hover_mode, HoverMode::X);
    }

    #[test]
    fn test_trend_skips_null_values() {
        let spec = build_multi_series_spec(&table(), &["Rel. Effort"], &MetricRegistry::standard())
            .unwrap();
        let chart = spec.chart().unwrap();
        let data = chart.series_named("Rel. Effort").unwrap();
        let trend = chart.series_named("Rel. Effort trend").unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(data.y.iter().filter(|v| v.is_none()).count(), 5);
        assert_eq!(trend.len(), 5);
        assert!(trend.y.iter().all(|v| v.is_some()));
        match (&data.x, &trend.x) {
            (XValues::Dates(d), XValues::Dates(t)) => assert_eq!(t[0], d[1]),
            other => panic!("unexpected x values: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_label_is_reported() {
        let err = build_multi_series_spec(&table(), &["Dist", "Watts"], &MetricRegistry::standard())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMetric(ref l) if l == "Watts"));
    }

    #[test]
    fn test_comparison_arity() {
        let registry = MetricRegistry::standard();
        for labels in [vec![], vec!["Dist"], vec!["Dist", "Avg. Pace", "Vert"]] {
            let err = build_comparison_spec(&table(), &labels, UnitSystem::Imperial, &registry)
                .unwrap_err();
            assert!(
                matches!(err, Error::Arity { expected: 2, got } if got == labels.len()),
                "{:?}",
                labels
            );
        }
        // Arity is checked before anything else
        let err = build_comparison_spec(
            &ActivityTable::empty(),
            &["Dist"],
            UnitSystem::Metric,
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Arity { .. }));
    }

    #[test]
    fn test_comparison_series() {
        let spec = build_comparison_spec(
            &table(),
            &["Dist", "Avg. Pace"],
            UnitSystem::Imperial,
            &MetricRegistry::standard(),
        )
        .unwrap();
        let chart = spec.chart().unwrap();

        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.data_series().count(), 1);
        assert_eq!(chart.trend_series().count(), 1);

        let data = chart.data_series().next().unwrap();
        assert_eq!(data.mode, SeriesMode::Markers);
        let tooltips = data.tooltips.as_ref().unwrap();
        assert_eq!(tooltips.len(), 10);
        // First run: 4.5 km at 5.95 min/km, converted to imperial
        assert_eq!(tooltips[0], "2.8 mi at 9.6 min/mi\nOn: Jan 01, 2021");

        let trend = chart.trend_series().next().unwrap();
        assert_eq!(trend.name, "Pace trend");
        assert_eq!(trend.line.dash, Dash::Dash);
        assert!(trend.tooltips.as_ref().unwrap()[0].starts_with("Trend: "));

        assert_eq!(chart.layout.x_title.as_deref(), Some("Distance (mi)"));
        assert_eq!(chart.layout.y_title.as_deref(), Some("Pace (min/mi)"));
        assert!(!chart.layout.show_legend);
        assert_eq!(chart.layout.hover_mode, HoverMode::Closest);
    }

    #[test]
    fn test_comparison_units_follow_request() {
        let registry = MetricRegistry::standard();
        let imperial = table().to_units(UnitSystem::Imperial);
        let spec = build_comparison_spec(&imperial, &["Vert", "Avg. Pace"], UnitSystem::Metric, &registry)
            .unwrap();
        let chart = spec.chart().unwrap();
        let data = chart.data_series().next().unwrap();
        match &data.x {
            XValues::Numbers(x) => assert!((x[0] - 41.0).abs() < 1e-9),
            other => panic!("unexpected x values: {:?}", other),
        }
        assert_eq!(chart.layout.x_title.as_deref(), Some("Vert (m)"));
    }

    #[test]
    fn test_comparison_empty_table() {
        let spec = build_comparison_spec(
            &ActivityTable::empty(),
            &["Dist", "Avg. Pace"],
            UnitSystem::Metric,
            &MetricRegistry::standard(),
        )
        .unwrap();
        assert_eq!(spec, ChartSpec::empty());
    }

    #[test]
    fn test_spec_serializes_with_kind_tag() {
        let json = serde_json::to_value(ChartSpec::no_selection()).unwrap();
        assert_eq!(json["kind"], "no_selection");
        assert_eq!(json["message"], NO_SELECTION_MESSAGE);

        let spec = build_multi_series_spec(&table(), &["Dist"], &MetricRegistry::standard()).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "chart");
        assert_eq!(json["series"][0]["name"], "Dist");
        assert_eq!(json["series"][0]["axis"], "secondary");
        assert_eq!(json["series"][1]["line"]["dash"], "dash");
    }

    #[test]
    fn test_date_x_round_trip() {
        let d = NaiveDate::from_ymd_opt(2021, 1, 5)
            .unwrap()
            .and_hms_opt(14, 30, 15)
            .unwrap();
        assert_eq!(x_to_date(date_to_x(d)), Some(d));
    }
}
