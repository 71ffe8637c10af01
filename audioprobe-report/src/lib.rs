//! # Audioprobe Report
//!
//! Structured metric reporting for verification scenarios. A scenario
//! records named values with a unit and a better-direction annotation plus
//! one summary metric, then emits them through `tracing` or serializes
//! them to JSON for external tooling.

#![deny(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Unit a reported value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    /// Milliseconds
    Ms,
    /// Plain count
    Count,
    /// Frames of audio
    Frames,
    /// Dimensionless ratio
    Ratio,
}

/// Whether a smaller value is an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricDirection {
    /// Smaller is better (latencies, jitter)
    LowerBetter,
    /// Informational only
    Neutral,
}

/// One named scenario metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    /// Metric name
    pub key: String,
    /// Measured value
    pub value: f64,
    /// Unit of the value
    pub unit: MetricUnit,
    /// Better-direction annotation
    pub direction: MetricDirection,
}

/// Metric log for one verification scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Unique id of this scenario run
    pub id: Uuid,
    /// Scenario name
    pub name: String,
    entries: Vec<MetricEntry>,
    summary: Option<MetricEntry>,
}

impl ScenarioReport {
    /// Create an empty report for the named scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entries: Vec::new(),
            summary: None,
        }
    }

    /// Record one metric value.
    pub fn add_value(
        &mut self,
        key: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        direction: MetricDirection,
    ) {
        self.entries.push(MetricEntry {
            key: key.into(),
            value,
            unit,
            direction,
        });
    }

    /// Set the single summary metric for the scenario.
    pub fn set_summary(
        &mut self,
        key: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        direction: MetricDirection,
    ) {
        self.summary = Some(MetricEntry {
            key: key.into(),
            value,
            unit,
            direction,
        });
    }

    /// All recorded metrics, in recording order.
    pub fn entries(&self) -> &[MetricEntry] {
        &self.entries
    }

    /// The summary metric, if one was set.
    pub fn summary(&self) -> Option<&MetricEntry> {
        self.summary.as_ref()
    }

    /// Look a recorded value up by key.
    pub fn value(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value)
    }

    /// Emit the report through `tracing`.
    pub fn emit(&self) {
        for entry in &self.entries {
            info!(
                scenario = %self.name,
                key = %entry.key,
                value = entry.value,
                unit = ?entry.unit,
                "scenario metric"
            );
        }
        if let Some(summary) = &self.summary {
            info!(
                scenario = %self.name,
                key = %summary.key,
                value = summary.value,
                unit = ?summary.unit,
                "scenario summary"
            );
        }
    }

    /// Serialize the report to a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
