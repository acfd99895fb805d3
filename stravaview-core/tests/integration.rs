//! Integration tests for the stravaview load → normalize → chart pipeline
//!
//! These tests use the Strava-style export in `tests/fixtures/activities.csv`
//! to verify the end-to-end flow from raw source to dashboard view.

use chrono::NaiveDate;
use stravaview_core::chart::NO_SELECTION_MESSAGE;
use stravaview_core::dashboard::PAIR_GUIDANCE;
use stravaview_core::normalize::normalize;
use stravaview_core::source::{self, ActivitySource, CachedSource, FileSource};
use stravaview_core::{
    build_dashboard, ActivityFilter, ActivityType, ChartBuilder, Config, DashboardRequest,
    MetricColumn, UnitSystem,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn fixture_source() -> FileSource {
    FileSource::new(fixture_path("activities.csv"))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ============================================
// Loading and normalization
// ============================================

#[test]
fn test_load_and_normalize_fixture() {
    let raw = fixture_source().load().expect("fixture should load");
    assert_eq!(raw.row_count(), 7);

    let table = normalize(&raw, UnitSystem::Metric).expect("fixture should normalize");
    let stats = table.stats();
    assert_eq!(stats.rows, 7);
    assert_eq!(stats.undated_rows, 1);
    assert!(stats.missing_optional_columns.is_empty());

    let records = table.display().records();
    assert_eq!(records.len(), 7);

    // Chronological, undated last
    let dates: Vec<_> = records.iter().map(|r| r.activity_date).collect();
    let dated: Vec<_> = dates.iter().flatten().collect();
    assert!(dated.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        dates[0].map(|d| d.date()),
        NaiveDate::from_ymd_opt(2020, 3, 12)
    );
    assert!(dates[6].is_none());

    // Treadmill run has no distance, so no rates
    assert_eq!(records[0].distance, None);
    assert_eq!(records[0].pace, None);
    assert_eq!(records[0].average_speed, None);

    // Jan 5 run: 5000 m in 1500 s
    let jan5 = records
        .iter()
        .find(|r| r.activity_date.map(|d| d.date()) == NaiveDate::from_ymd_opt(2021, 1, 5))
        .expect("Jan 5 run");
    assert!(approx(jan5.distance.unwrap(), 5.0));
    assert!(approx(jan5.elapsed_time.unwrap(), 25.0));
    assert!(approx(jan5.pace.unwrap(), 5.0));
    assert!(approx(jan5.elevation_gain.unwrap(), 50.0));

    assert_eq!(records[2].activity_type, ActivityType::Ride);
}

#[test]
fn test_unit_toggle_round_trip() {
    let raw = fixture_source().load().unwrap();
    let imperial = normalize(&raw, UnitSystem::Imperial).unwrap();
    let metric = imperial.with_units(UnitSystem::Metric);
    let back = metric.with_units(UnitSystem::Imperial);

    for column in MetricColumn::ALL {
        assert_eq!(imperial.display().column(column), back.display().column(column));
    }
    assert_eq!(metric.display(), metric.canonical());
}

// ============================================
// Dashboard
// ============================================

#[test]
fn test_default_dashboard_over_fixture() {
    let raw = fixture_source().load().unwrap();
    let request = DashboardRequest {
        filter: ActivityFilter::between(
            NaiveDate::from_ymd_opt(2020, 3, 12).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 30).unwrap(),
        )
        .of_type(ActivityType::Run),
        ..Default::default()
    };

    let view = build_dashboard(&raw, &request, &ChartBuilder::default()).unwrap();

    // Undated run is excluded once a date bound is set
    assert_eq!(view.summary.count, 4);
    assert!(approx(view.summary.total_distance, 23.0 * 0.621371));
    assert_eq!(view.summary.units, UnitSystem::Imperial);

    let overview = view.overview.chart().expect("overview chart");
    let names: Vec<&str> = overview.series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Dist", "Dist trend", "Avg. Pace", "Avg. Pace trend"]);

    assert_eq!(view.comparisons.len(), 2);
    for comparison in &view.comparisons {
        let chart = comparison.spec().and_then(|s| s.chart()).expect("comparison chart");
        assert_eq!(chart.data_series().count(), 1);
        assert_eq!(chart.trend_series().count(), 1);
    }
}

#[test]
fn test_dashboard_without_bounds_keeps_undated() {
    let raw = fixture_source().load().unwrap();
    let request = DashboardRequest {
        filter: ActivityFilter::all().of_type(ActivityType::Run),
        units: UnitSystem::Metric,
        metrics: Vec::new(),
        comparisons: vec![vec!["Dist".to_string(), "Vert".to_string(), "Avg. HR".to_string()]],
    };

    let view = build_dashboard(&raw, &request, &ChartBuilder::default()).unwrap();
    assert_eq!(view.summary.count, 5);
    assert_eq!(view.overview.message(), Some(NO_SELECTION_MESSAGE));
    assert_eq!(view.comparisons[0].guidance(), Some(PAIR_GUIDANCE));
}

#[test]
fn test_dashboard_json_export() {
    let raw = fixture_source().load().unwrap();
    let view = build_dashboard(&raw, &DashboardRequest::default(), &ChartBuilder::default())
        .unwrap();

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["units"], "imperial");
    assert_eq!(json["activity_type"], "Run");
    assert_eq!(json["overview"]["kind"], "chart");
    let series = json["overview"]["series"].as_array().unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(series[1]["line"]["dash"], "dash");
}

// ============================================
// Sources, cache and config
// ============================================

#[test]
fn test_cache_reuses_until_invalidated() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("activities.csv");
    fs::copy(fixture_path("activities.csv"), &path).unwrap();

    let mut cache = CachedSource::new(FileSource::new(&path));
    assert_eq!(cache.table().unwrap().row_count(), 7);

    // A changed file is not seen until the cache is invalidated
    fs::write(
        &path,
        "Activity Date,Activity Type,Elapsed Time,Distance,Elevation Gain\n2021-02-01,Run,1500,5000,50\n",
    )
    .unwrap();
    assert_eq!(cache.table().unwrap().row_count(), 7);
    assert_eq!(cache.load_count(), 1);

    cache.invalidate();
    assert_eq!(cache.table().unwrap().row_count(), 1);
    assert_eq!(cache.load_count(), 2);
}

#[test]
fn test_config_drives_source_and_request() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[source]
kind = "file"
path = {:?}

[display]
units = "metric"
activity_type = "all"
metrics = ["Vert"]
comparisons = []

[trend]
frac = 0.5
"#,
            fixture_path("activities.csv")
        ),
    )
    .unwrap();

    let config = Config::load_from(&config_path).unwrap();
    config.validate().unwrap();

    let source = source::from_config(&config.source).unwrap();
    let raw = source.load().unwrap();
    let request = DashboardRequest::from_display(&config.display);
    let builder = ChartBuilder::new(config.trend.lowess());

    let view = build_dashboard(&raw, &request, &builder).unwrap();
    assert_eq!(view.summary.count, 7);
    assert_eq!(view.activity_type, None);
    assert!(view.comparisons.is_empty());

    let overview = view.overview.chart().unwrap();
    assert_eq!(overview.series.len(), 2);
    // The undated row has no x position
    assert_eq!(overview.series[0].len(), 6);
}
