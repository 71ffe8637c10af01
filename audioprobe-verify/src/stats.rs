//! Running drift statistics

use serde::Serialize;

/// Incremental mean / mean-absolute / max-absolute over observed
/// deviations. Values are whatever domain the caller folds in; the event
/// verifier uses milliseconds.
///
/// Querying an empty accumulator yields NaN rather than a panic.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DriftStatistic {
    sum: f64,
    sum_abs: f64,
    max_abs: f64,
    count: u32,
}

impl DriftStatistic {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one deviation into the statistics.
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_abs += value.abs();
        if value.abs() > self.max_abs {
            self.max_abs = value.abs();
        }
        self.count += 1;
    }

    /// Mean deviation; NaN if nothing was added.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum / f64::from(self.count)
    }

    /// Mean absolute deviation; NaN if nothing was added.
    pub fn avg_abs(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.sum_abs / f64::from(self.count)
    }

    /// Largest absolute deviation seen; zero if nothing was added.
    pub fn max_abs(&self) -> f64 {
        self.max_abs
    }

    /// Number of deviations folded in.
    pub fn count(&self) -> u32 {
        self.count
    }
}
