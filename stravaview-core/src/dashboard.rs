//! Dashboard pass
//!
//! One request/response cycle: normalize the raw table, apply the user's
//! filter, convert to display units, then build the summary, the overview
//! chart and each comparison chart. Every pass starts from the same raw
//! snapshot, so changing units or filters never compounds.

use serde::Serialize;

use crate::chart::{ChartBuilder, ChartSpec};
use crate::config::DisplayConfig;
use crate::error::{Error, Result};
use crate::filter::ActivityFilter;
use crate::metrics::MetricRegistry;
use crate::normalize::{normalize_canonical, NormalizeStats};
use crate::trend::TrendSmoother;
use crate::types::{ActivityTable, ActivityType, MetricColumn, RawTable, UnitSystem};

/// Shown in place of a comparison chart whose selection is not a pair.
pub const PAIR_GUIDANCE: &str = "Pick exactly two metrics to compare.";

/// What the user asked to see.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub filter: ActivityFilter,
    pub units: UnitSystem,
    /// Labels for the overview chart
    pub metrics: Vec<String>,
    /// Label pairs (x, y) for comparison charts
    pub comparisons: Vec<Vec<String>>,
}

impl Default for DashboardRequest {
    fn default() -> Self {
        Self::from_display(&DisplayConfig::default())
    }
}

impl DashboardRequest {
    /// Request seeded from configured display defaults.
    pub fn from_display(display: &DisplayConfig) -> Self {
        Self {
            filter: display.filter(),
            units: display.units,
            metrics: display.metrics.clone(),
            comparisons: display.comparisons.clone(),
        }
    }
}

/// Totals over the selected activities, in display units.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub units: UnitSystem,
    pub count: usize,
    pub total_distance: f64,
    /// Minutes
    pub total_elapsed: f64,
    pub total_elevation: f64,
    /// Total time over total distance, for activities that have both
    pub mean_pace: Option<f64>,
}

impl ActivitySummary {
    pub fn from_table(table: &ActivityTable) -> Self {
        let sum = |column: MetricColumn| -> f64 {
            table.iter().filter_map(|r| r.value(column)).sum()
        };

        let (paced_time, paced_distance) = table
            .iter()
            .filter_map(|r| match (r.elapsed_time, r.distance) {
                (Some(t), Some(d)) if t > 0.0 && d > 0.0 => Some((t, d)),
                _ => None,
            })
            .fold((0.0, 0.0), |(t, d), (rt, rd)| (t + rt, d + rd));

        let mean_pace = if paced_distance > 0.0 {
            Some(paced_time / paced_distance)
        } else {
            None
        };

        Self {
            units: table.units(),
            count: table.len(),
            total_distance: sum(MetricColumn::Distance),
            total_elapsed: sum(MetricColumn::ElapsedTime),
            total_elevation: sum(MetricColumn::ElevationGain),
            mean_pace,
        }
    }

    /// Format total distance (e.g., "31.1 mi").
    pub fn format_distance(&self) -> String {
        format!("{:.1} {}", self.total_distance, distance_unit(self.units))
    }

    /// Format total elapsed time (e.g., "12h 05m").
    pub fn format_elapsed(&self) -> String {
        let minutes = self.total_elapsed.round() as i64;
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }

    /// Format total elevation gain (e.g., "1640 ft").
    pub fn format_elevation(&self) -> String {
        let unit = match self.units {
            UnitSystem::Imperial => "ft",
            UnitSystem::Metric => "m",
        };
        format!("{:.0} {}", self.total_elevation, unit)
    }

    /// Format mean pace as minutes:seconds (e.g., "8:03 /mi").
    pub fn format_pace(&self) -> String {
        match self.mean_pace {
            Some(pace) => {
                let seconds = (pace * 60.0).round() as i64;
                format!("{}:{:02} /{}", seconds / 60, seconds % 60, distance_unit(self.units))
            }
            None => "-".to_string(),
        }
    }
}

fn distance_unit(units: UnitSystem) -> &'static str {
    match units {
        UnitSystem::Imperial => "mi",
        UnitSystem::Metric => "km",
    }
}

/// Result of one comparison request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Spec(ChartSpec),
    Guidance { message: String },
}

/// A comparison chart or the reason it could not be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    pub labels: Vec<String>,
    pub outcome: ComparisonOutcome,
}

impl ComparisonView {
    pub fn spec(&self) -> Option<&ChartSpec> {
        match &self.outcome {
            ComparisonOutcome::Spec(spec) => Some(spec),
            ComparisonOutcome::Guidance { .. } => None,
        }
    }

    pub fn guidance(&self) -> Option<&str> {
        match &self.outcome {
            ComparisonOutcome::Guidance { message } => Some(message),
            ComparisonOutcome::Spec(_) => None,
        }
    }
}

/// Everything a renderer needs for one dashboard refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub units: UnitSystem,
    pub activity_type: Option<ActivityType>,
    pub normalize: NormalizeStats,
    pub summary: ActivitySummary,
    pub overview: ChartSpec,
    pub comparisons: Vec<ComparisonView>,
}

/// Run one dashboard pass over `raw`.
///
/// Schema and unknown-label errors propagate; a comparison that is not a
/// pair becomes [`PAIR_GUIDANCE`].
pub fn build_dashboard<S: TrendSmoother>(
    raw: &RawTable,
    request: &DashboardRequest,
    builder: &ChartBuilder<S>,
) -> Result<DashboardView> {
    let registry = MetricRegistry::standard();

    let (canonical, normalize_stats) = normalize_canonical(raw)?;
    let selected = request.filter.apply(&canonical);
    let display = selected.to_units(request.units);

    let summary = ActivitySummary::from_table(&display);
    let overview = builder.multi_series(&display, &request.metrics, &registry)?;

    let mut comparisons = Vec::with_capacity(request.comparisons.len());
    for labels in &request.comparisons {
        let outcome = match builder.comparison(&display, labels, request.units, &registry) {
            Ok(spec) => ComparisonOutcome::Spec(spec),
            Err(Error::Arity { expected, got }) => {
                tracing::debug!(expected, got, labels = ?labels, "Comparison is not a pair");
                ComparisonOutcome::Guidance {
                    message: PAIR_GUIDANCE.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        comparisons.push(ComparisonView {
            labels: labels.clone(),
            outcome,
        });
    }

    tracing::info!(
        rows = normalize_stats.rows,
        selected = summary.count,
        units = %request.units,
        smoother = builder.smoother().name(),
        comparisons = comparisons.len(),
        "Built dashboard"
    );

    Ok(DashboardView {
        units: request.units,
        activity_type: request.filter.activity_type.clone(),
        normalize: normalize_stats,
        summary,
        overview,
        comparisons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::NO_SELECTION_MESSAGE;
    use crate::types::RawValue;
    use chrono::NaiveDate;

    fn text(values: &[&str]) -> Vec<RawValue> {
        values.iter().map(|v| RawValue::from(*v)).collect()
    }

    fn raw() -> RawTable {
        RawTable::new()
            .with_column(
                "Activity Date",
                text(&["2021-01-05 07:00:00", "2021-01-03 07:00:00", "2021-01-04 07:00:00", "2021-01-06 07:00:00"]),
            )
            .with_column("Activity Type", text(&["Run", "Run", "Ride", "Run"]))
            .with_column("Distance", text(&["5000", "10000", "30000", "8000"]))
            .with_column("Elapsed Time", text(&["1500", "3300", "3600", "2700"]))
            .with_column("Elevation Gain", text(&["50", "120", "300", "80"]))
            .with_column("Average Heart Rate", text(&["150", "145", "", "155"]))
    }

    fn request(units: UnitSystem) -> DashboardRequest {
        DashboardRequest {
            filter: ActivityFilter::all().of_type(ActivityType::Run),
            units,
            metrics: vec!["Dist".to_string(), "Avg. HR".to_string()],
            comparisons: vec![
                vec!["Dist".to_string(), "Avg. Pace".to_string()],
                vec!["Vert".to_string()],
            ],
        }
    }

    #[test]
    fn test_default_request() {
        let request = DashboardRequest::default();
        assert_eq!(request.units, UnitSystem::Imperial);
        assert_eq!(request.filter.activity_type, Some(ActivityType::Run));
        assert_eq!(request.metrics, vec!["Dist", "Avg. Pace"]);
        assert_eq!(request.comparisons.len(), 2);
    }

    #[test]
    fn test_dashboard_metric_summary() {
        let view = build_dashboard(&raw(), &request(UnitSystem::Metric), &ChartBuilder::default())
            .unwrap();

        assert_eq!(view.summary.count, 3);
        assert!((view.summary.total_distance - 23.0).abs() < 1e-9);
        assert!((view.summary.total_elapsed - 125.0).abs() < 1e-9);
        assert!((view.summary.total_elevation - 250.0).abs() < 1e-9);
        let pace = view.summary.mean_pace.unwrap();
        assert!((pace - 125.0 / 23.0).abs() < 1e-9);
        assert_eq!(view.summary.format_distance(), "23.0 km");
        assert_eq!(view.summary.format_elapsed(), "2h 05m");
        assert_eq!(view.normalize.rows, 4);
    }

    #[test]
    fn test_dashboard_charts_and_guidance() {
        let view = build_dashboard(&raw(), &request(UnitSystem::Imperial), &ChartBuilder::default())
            .unwrap();

        let overview = view.overview.chart().unwrap();
        assert_eq!(overview.data_series().count(), 2);
        assert_eq!(overview.trend_series().count(), 2);

        assert_eq!(view.comparisons.len(), 2);
        let first = view.comparisons[0].spec().unwrap().chart().unwrap();
        assert_eq!(first.layout.x_title.as_deref(), Some("Distance (mi)"));
        assert_eq!(view.comparisons[1].guidance(), Some(PAIR_GUIDANCE));
    }

    #[test]
    fn test_unit_toggle_keeps_counts() {
        let metric = build_dashboard(&raw(), &request(UnitSystem::Metric), &ChartBuilder::default())
            .unwrap();
        let imperial =
            build_dashboard(&raw(), &request(UnitSystem::Imperial), &ChartBuilder::default())
                .unwrap();
        assert_eq!(metric.summary.count, imperial.summary.count);
        assert!((imperial.summary.total_distance - 23.0 * 0.621371).abs() < 1e-9);
        assert!((imperial.summary.total_elapsed - metric.summary.total_elapsed).abs() < 1e-9);
    }

    #[test]
    fn test_empty_selection_is_sentinel() {
        let mut req = request(UnitSystem::Metric);
        req.filter.start = NaiveDate::from_ymd_opt(2022, 1, 1);
        let view = build_dashboard(&raw(), &req, &ChartBuilder::default()).unwrap();
        assert_eq!(view.summary.count, 0);
        assert_eq!(view.summary.mean_pace, None);
        assert_eq!(view.summary.format_pace(), "-");
        assert_eq!(view.overview, ChartSpec::empty());
        assert_eq!(view.comparisons[0].spec(), Some(&ChartSpec::empty()));
    }

    #[test]
    fn test_no_metrics_is_no_selection() {
        let mut req = request(UnitSystem::Metric);
        req.metrics.clear();
        let view = build_dashboard(&raw(), &req, &ChartBuilder::default()).unwrap();
        assert_eq!(view.overview.message(), Some(NO_SELECTION_MESSAGE));
    }

    #[test]
    fn test_unknown_label_propagates() {
        let mut req = request(UnitSystem::Metric);
        req.comparisons = vec![vec!["Dist".to_string(), "Watts".to_string()]];
        let err = build_dashboard(&raw(), &req, &ChartBuilder::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownMetric(label) if label == "Watts"));
    }

    #[test]
    fn test_schema_error_propagates() {
        let table = RawTable::new().with_column("Distance", text(&["5000"]));
        let err = build_dashboard(&table, &DashboardRequest::default(), &ChartBuilder::default())
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_format_pace() {
        let summary = ActivitySummary {
            units: UnitSystem::Imperial,
            mean_pace: Some(8.05),
            ..Default::default()
        };
        assert_eq!(summary.format_pace(), "8:03 /mi");
    }

    #[test]
    fn test_view_serializes() {
        let view = build_dashboard(&raw(), &request(UnitSystem::Metric), &ChartBuilder::default())
            .unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["units"], "metric");
        assert_eq!(json["overview"]["kind"], "chart");
        assert_eq!(json["comparisons"][1]["outcome"]["guidance"]["message"], PAIR_GUIDANCE);
    }
}
