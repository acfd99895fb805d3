//! stravaview - Personal activity dashboard
//!
//! Loads exported activities, applies the selected filters and units, and
//! prints the dashboard as text or as JSON chart specs for a renderer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use stravaview_core::chart::{Chart, ChartSpec, SeriesRole};
use stravaview_core::config::SourceKind;
use stravaview_core::dashboard::{ComparisonOutcome, DashboardView};
use stravaview_core::source::{self, ActivitySource, CachedSource};
use stravaview_core::{build_dashboard, ActivityType, ChartBuilder, Config, DashboardRequest, UnitSystem};

#[derive(Parser, Debug)]
#[command(name = "stravaview")]
#[command(about = "Charts and trends from your Strava activity export")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/stravaview/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read activities from this CSV file
    #[arg(long, conflicts_with = "sheet")]
    file: Option<PathBuf>,

    /// Read activities from this Google Sheets spreadsheet key
    #[arg(long)]
    sheet: Option<String>,

    /// Worksheet name for the sheet source
    #[arg(long)]
    worksheet: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Activity type to include ("all" for every type)
    #[arg(long)]
    activity_type: Option<String>,

    /// Unit system (imperial or metric)
    #[arg(long)]
    units: Option<UnitSystem>,

    /// Metric for the overview chart (repeatable)
    #[arg(long = "metric")]
    metrics: Vec<String>,

    /// Metric pair to compare, e.g. "Dist,Avg. Pace" (repeatable)
    #[arg(long = "compare")]
    comparisons: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Text)]
    export: ExportFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    let _log_guard = stravaview_core::logging::init(&config.logging).ok();

    apply_overrides(&mut config, &args);
    config.validate().context("invalid configuration")?;

    let request = build_request(&config, &args);

    let activity_source =
        source::from_config(&config.source).context("failed to set up activity source")?;
    let description = activity_source.describe();
    tracing::info!(source = %description, "Starting dashboard pass");
    let mut cache = CachedSource::new(activity_source);
    let raw = cache
        .table()
        .with_context(|| format!("failed to load activities from {}", description))?;

    let builder = ChartBuilder::new(config.trend.lowess());
    let view = build_dashboard(raw, &request, &builder).context("failed to build dashboard")?;

    match args.export {
        ExportFormat::Json => print_json(&view)?,
        ExportFormat::Text => print_terminal(&view, &request, &description),
    }

    Ok(())
}

/// Command-line flags take precedence over the config file.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(path) = &args.file {
        config.source.kind = SourceKind::File;
        config.source.path = path.clone();
    }
    if let Some(key) = &args.sheet {
        config.source.kind = SourceKind::Sheet;
        config.source.sheet.spreadsheet_key = Some(key.clone());
    }
    if let Some(worksheet) = &args.worksheet {
        config.source.sheet.worksheet = worksheet.clone();
    }

    let display = &mut config.display;
    if let Some(start) = args.start {
        display.start_date = Some(start);
    }
    if let Some(end) = args.end {
        display.end_date = Some(end);
    }
    if let Some(activity_type) = &args.activity_type {
        display.activity_type = Some(activity_type.clone());
    }
    if let Some(units) = args.units {
        display.units = units;
    }
}

/// Labels are checked when the dashboard is built, so flag values are
/// passed through as given.
fn build_request(config: &Config, args: &Args) -> DashboardRequest {
    let mut request = DashboardRequest::from_display(&config.display);
    if !args.metrics.is_empty() {
        request.metrics = args.metrics.clone();
    }
    if !args.comparisons.is_empty() {
        request.comparisons = args
            .comparisons
            .iter()
            .map(|pair| parse_label_list(pair))
            .collect();
    }
    request
}

fn parse_label_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_json(view: &DashboardView) -> Result<()> {
    let json = serde_json::to_string_pretty(view).context("failed to serialize dashboard")?;
    println!("{}", json);
    Ok(())
}

fn print_terminal(view: &DashboardView, request: &DashboardRequest, source: &str) {
    let activity_type = view
        .activity_type
        .as_ref()
        .map(ActivityType::as_str)
        .unwrap_or("All");
    let range = match (request.filter.start, request.filter.end) {
        (None, None) => "all dates".to_string(),
        (start, end) => format!(
            "{} to {}",
            start.map(|d| d.to_string()).unwrap_or_else(|| "start".to_string()),
            end.map(|d| d.to_string()).unwrap_or_else(|| "today".to_string())
        ),
    };

    println!("stravaview: {}", source);
    println!("   Type: {}   Units: {}   Range: {}", activity_type, view.units, range);
    println!();

    let summary = &view.summary;
    println!("SUMMARY");
    println!("   Activities: {}", summary.count);
    println!("   Distance:   {}", summary.format_distance());
    println!("   Time:       {}", summary.format_elapsed());
    println!("   Elevation:  {}", summary.format_elevation());
    println!("   Pace:       {}", summary.format_pace());
    if view.normalize.nulled_cells > 0 || view.normalize.undated_rows > 0 {
        println!(
            "   Skipped:    {} unreadable cells, {} undated rows",
            view.normalize.nulled_cells, view.normalize.undated_rows
        );
    }
    println!();

    println!("OVERVIEW");
    print_spec(&view.overview);
    println!();

    for comparison in &view.comparisons {
        println!("COMPARE {}", comparison.labels.join(" vs "));
        match &comparison.outcome {
            ComparisonOutcome::Spec(spec) => print_spec(spec),
            ComparisonOutcome::Guidance { message } => println!("   {}", message),
        }
        println!();
    }
}

fn print_spec(spec: &ChartSpec) {
    match spec {
        ChartSpec::Chart(chart) => print_chart(chart),
        ChartSpec::Empty { message } | ChartSpec::NoSelection { message } => {
            println!("   {}", message)
        }
    }
}

fn print_chart(chart: &Chart) {
    if let (Some(x), Some(y)) = (&chart.layout.x_title, &chart.layout.y_title) {
        println!("   x: {}   y: {}", x, y);
    }
    for series in &chart.series {
        let role = match series.role {
            SeriesRole::Data => "data",
            SeriesRole::Trend => "trend",
        };
        let last = series
            .last_value()
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:<28} {:<5} {:<9} {:>4} pts   last {}",
            series.name,
            role,
            format!("{:?}", series.axis).to_lowercase(),
            series.len(),
            last
        );
    }
}
