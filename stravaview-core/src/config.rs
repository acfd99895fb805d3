//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/stravaview/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/stravaview/` (~/.config/stravaview/)
//! - State/Logs: `$XDG_STATE_HOME/stravaview/` (~/.local/state/stravaview/)

use crate::error::{Error, Result};
use crate::filter::ActivityFilter;
use crate::metrics::MetricRegistry;
use crate::trend::{Lowess, DEFAULT_FRAC, DEFAULT_ITERATIONS};
use crate::types::{ActivityType, UnitSystem};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted for a Sheets bearer token.
pub const SHEETS_TOKEN_ENV: &str = "STRAVAVIEW_SHEETS_TOKEN";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where raw activities come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Default selections for the dashboard
    #[serde(default)]
    pub display: DisplayConfig,

    /// Trend smoothing parameters
    #[serde(default)]
    pub trend: TrendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kind of raw data source
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local CSV export
    #[default]
    File,
    /// Google Sheets worksheet
    Sheet,
}

/// Raw data source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// CSV path for the file source, relative to the working directory
    #[serde(default = "default_activities_path")]
    pub path: PathBuf,

    /// Spreadsheet settings for the sheet source
    #[serde(default)]
    pub sheet: SheetConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: default_activities_path(),
            sheet: SheetConfig::default(),
        }
    }
}

fn default_activities_path() -> PathBuf {
    PathBuf::from("activities.csv")
}

/// Google Sheets source configuration
///
/// Credentials are passed through to the API as given; nothing is stored.
#[derive(Debug, Deserialize, Clone)]
pub struct SheetConfig {
    /// Spreadsheet key (the id in the sheet URL)
    pub spreadsheet_key: Option<String>,

    /// Worksheet (tab) name
    #[serde(default = "default_worksheet")]
    pub worksheet: String,

    /// API key sent as the `key` query parameter
    pub api_key: Option<String>,

    /// OAuth bearer token (can also use STRAVAVIEW_SHEETS_TOKEN)
    pub access_token: Option<String>,

    /// API base URL
    #[serde(default = "default_sheets_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_sheet_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_sheet_max_retries")]
    pub max_retries: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_key: None,
            worksheet: default_worksheet(),
            api_key: None,
            access_token: None,
            base_url: default_sheets_base_url(),
            timeout_secs: default_sheet_timeout(),
            max_retries: default_sheet_max_retries(),
        }
    }
}

impl SheetConfig {
    /// Bearer token from config, falling back to the environment.
    pub fn resolved_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var(SHEETS_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.spreadsheet_key.as_deref() {
            None | Some("") => {
                return Err(Error::Config(
                    "source.sheet.spreadsheet_key is required for the sheet source".to_string(),
                ))
            }
            Some(_) => {}
        }
        if self.worksheet.trim().is_empty() {
            return Err(Error::Config(
                "source.sheet.worksheet must not be empty".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "source.sheet.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_worksheet() -> String {
    "Activities".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_sheet_timeout() -> u64 {
    30
}

fn default_sheet_max_retries() -> usize {
    3
}

/// Default dashboard selections
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default)]
    pub units: UnitSystem,

    /// Activity type to chart; `None` charts every type
    #[serde(default = "default_activity_type")]
    pub activity_type: Option<String>,

    /// Metrics on the overview chart
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Metric pairs for comparison charts (x, y)
    #[serde(default = "default_comparisons")]
    pub comparisons: Vec<Vec<String>>,

    /// Inclusive first day
    pub start_date: Option<NaiveDate>,

    /// Inclusive last day
    pub end_date: Option<NaiveDate>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            units: UnitSystem::default(),
            activity_type: default_activity_type(),
            metrics: default_metrics(),
            comparisons: default_comparisons(),
            start_date: None,
            end_date: None,
        }
    }
}

impl DisplayConfig {
    /// Filter described by the configured dates and activity type.
    ///
    /// An activity type of `"all"` (or empty) selects every type.
    pub fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            start: self.start_date,
            end: self.end_date,
            activity_type: self
                .activity_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("all"))
                .map(ActivityType::parse),
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self, registry: &MetricRegistry) -> Result<()> {
        let labels = self.metrics.iter().chain(self.comparisons.iter().flatten());
        for label in labels {
            if registry.get(label).is_none() {
                return Err(Error::Config(format!(
                    "display: unknown metric label {:?} (expected one of {:?})",
                    label,
                    registry.labels()
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::Config(format!(
                    "display.start_date {} is after display.end_date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

fn default_activity_type() -> Option<String> {
    Some("Run".to_string())
}

fn default_metrics() -> Vec<String> {
    vec!["Dist".to_string(), "Avg. Pace".to_string()]
}

fn default_comparisons() -> Vec<Vec<String>> {
    vec![
        vec!["Dist".to_string(), "Avg. Pace".to_string()],
        vec!["Vert".to_string(), "Avg. Pace".to_string()],
    ]
}

/// Trend smoothing configuration
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TrendConfig {
    /// Fraction of points in each local regression
    #[serde(default = "default_trend_frac")]
    pub frac: f64,

    /// Robustifying iterations
    #[serde(default = "default_trend_iterations")]
    pub iterations: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            frac: default_trend_frac(),
            iterations: default_trend_iterations(),
        }
    }
}

impl TrendConfig {
    pub fn lowess(&self) -> Lowess {
        Lowess::new(self.frac, self.iterations)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !(self.frac > 0.0 && self.frac <= 1.0) {
            return Err(Error::Config(format!(
                "trend.frac must be in (0, 1], got {}",
                self.frac
            )));
        }
        Ok(())
    }
}

fn default_trend_frac() -> f64 {
    DEFAULT_FRAC
}

fn default_trend_iterations() -> usize {
    DEFAULT_ITERATIONS
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Check every section that has constraints beyond its types.
    pub fn validate(&self) -> Result<()> {
        if self.source.kind == SourceKind::Sheet {
            self.source.sheet.validate()?;
        }
        self.display.validate(&MetricRegistry::standard())?;
        self.trend.validate()?;
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/stravaview/config.toml` (~/.config/stravaview/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("stravaview").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/stravaview/` (~/.local/state/stravaview/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("stravaview")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/stravaview/stravaview.log` (~/.local/state/stravaview/stravaview.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("stravaview.log")
    }
}
