//! # stravaview-core
//!
//! Core library for stravaview - a dashboard over exported fitness activities.
//!
//! This library provides:
//! - Raw activity sources (CSV export, Google Sheets) with a session cache
//! - A normalizer producing typed, chronologically ordered activity tables
//! - Date/type filtering and Imperial/Metric unit conversion
//! - Renderer-agnostic chart specs with LOWESS trend overlays
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Raw:** [`RawTable`] as the source returned it (untyped cells)
//! - **Canonical:** [`ActivityTable`] in kilometers, minutes and meters
//! - **Display:** a converted copy in the user's [`UnitSystem`], plus [`ChartSpec`]s
//!
//! Each dashboard pass starts again from the raw layer, so unit toggles
//! never compound.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stravaview_core::source::{CachedSource, FileSource};
//! use stravaview_core::{build_dashboard, ChartBuilder, DashboardRequest};
//!
//! let mut source = CachedSource::new(FileSource::new("activities.csv"));
//! let raw = source.table().expect("failed to load activities");
//!
//! let view = build_dashboard(raw, &DashboardRequest::default(), &ChartBuilder::default())
//!     .expect("failed to build dashboard");
//! println!("{} activities", view.summary.count);
//! ```

// Re-export commonly used items at the crate root
pub use chart::{build_comparison_spec, build_multi_series_spec, ChartBuilder, ChartSpec};
pub use config::Config;
pub use dashboard::{build_dashboard, DashboardRequest, DashboardView};
pub use error::{Error, Result};
pub use filter::ActivityFilter;
pub use metrics::{MetricDescriptor, MetricRegistry};
pub use normalize::{normalize, NormalizedTable};
pub use trend::{Lowess, TrendSmoother};
pub use types::*;

// Public modules
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod source;
pub mod trend;
pub mod types;
