//! Metric registry: the single lookup table from user-facing labels to
//! columns, units and chart placement.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{Dimension, MetricColumn, UnitSystem};

/// Y axis a series is drawn against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    Secondary,
}

/// Descriptor for a metric the dashboard can chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDescriptor {
    /// Label shown in the metric picker (e.g. "Avg. HR")
    pub label: &'static str,
    /// Column the label resolves to
    pub column: MetricColumn,
    /// Axis title (e.g. "Distance" for "Dist")
    pub title: &'static str,
    pub unit_imperial: &'static str,
    pub unit_metric: &'static str,
    pub dimension: Dimension,
    /// Decimal places used in tooltips
    pub precision: usize,
}

impl MetricDescriptor {
    pub fn unit(&self, units: UnitSystem) -> &'static str {
        match units {
            UnitSystem::Imperial => self.unit_imperial,
            UnitSystem::Metric => self.unit_metric,
        }
    }

    /// Axis title with unit suffix, e.g. "Pace (min/mi)".
    pub fn axis_title(&self, units: UnitSystem) -> String {
        format!("{} ({})", self.title, self.unit(units))
    }

    /// Format a value with this metric's precision and unit.
    pub fn format_value(&self, value: f64, units: UnitSystem) -> String {
        format!("{:.*} {}", self.precision, value, self.unit(units))
    }
}

const STANDARD_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        label: "Avg. HR",
        column: MetricColumn::AverageHeartRate,
        title: "Heart Rate",
        unit_imperial: "bpm",
        unit_metric: "bpm",
        dimension: Dimension::HeartRate,
        precision: 0,
    },
    MetricDescriptor {
        label: "Avg. Pace",
        column: MetricColumn::Pace,
        title: "Pace",
        unit_imperial: "min/mi",
        unit_metric: "min/km",
        dimension: Dimension::Pace,
        precision: 1,
    },
    MetricDescriptor {
        label: "Dist",
        column: MetricColumn::Distance,
        title: "Distance",
        unit_imperial: "mi",
        unit_metric: "km",
        dimension: Dimension::Distance,
        precision: 1,
    },
    MetricDescriptor {
        label: "Vert",
        column: MetricColumn::ElevationGain,
        title: "Vert",
        unit_imperial: "ft",
        unit_metric: "m",
        dimension: Dimension::Elevation,
        precision: 0,
    },
    MetricDescriptor {
        label: "Rel. Effort",
        column: MetricColumn::RelativeEffort,
        title: "Relative Effort",
        unit_imperial: "pts",
        unit_metric: "pts",
        dimension: Dimension::Effort,
        precision: 0,
    },
    MetricDescriptor {
        label: "Avg. Cadence",
        column: MetricColumn::AverageCadence,
        title: "Cadence",
        unit_imperial: "spm",
        unit_metric: "spm",
        dimension: Dimension::Cadence,
        precision: 0,
    },
];

/// Labels whose series share the primary axis; their ranges co-locate well.
/// Every other label goes to [`Axis::Secondary`].
const AXIS_POLICY: &[(&str, Axis)] = &[("Vert", Axis::Primary), ("Avg. HR", Axis::Primary)];

/// A set of metric descriptors with label lookup.
#[derive(Debug, Clone, Copy)]
pub struct MetricRegistry {
    metrics: &'static [MetricDescriptor],
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl MetricRegistry {
    /// The built-in label set.
    pub fn standard() -> Self {
        Self {
            metrics: STANDARD_METRICS,
        }
    }

    pub fn get(&self, label: &str) -> Option<&'static MetricDescriptor> {
        self.metrics.iter().find(|m| m.label == label)
    }

    /// Resolve a label or fail with [`Error::UnknownMetric`].
    pub fn resolve(&self, label: &str) -> Result<&'static MetricDescriptor> {
        self.get(label)
            .ok_or_else(|| Error::UnknownMetric(label.to_string()))
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.label).collect()
    }

    pub fn list(&self) -> Vec<MetricDescriptor> {
        self.metrics.to_vec()
    }

    /// List metrics measuring a given dimension.
    pub fn list_for_dimension(&self, dimension: Dimension) -> Vec<MetricDescriptor> {
        self.metrics
            .iter()
            .filter(|m| m.dimension == dimension)
            .cloned()
            .collect()
    }
}

/// Axis a label's series is drawn on.
pub fn axis_for(label: &str) -> Axis {
    AXIS_POLICY
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, axis)| *axis)
        .unwrap_or(Axis::Secondary)
}
