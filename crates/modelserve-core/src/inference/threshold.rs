//! Placeholder predictor and drift detector.
//!
//! Both rules are toys with no statistical basis. The thresholds are strict
//! (`>`), so a vector summing to exactly 10 predicts `0` and a value of
//! exactly 100 does not raise drift.

use crate::error::Result;

use super::{DriftDetector, Prediction, Predictor};

/// Default sum threshold of [`ThresholdPredictor`].
pub const DEFAULT_SUM_THRESHOLD: f64 = 10.0;
/// Default per-value threshold of [`ThresholdDriftDetector`].
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 100.0;

/// Predicts `1` when the sum of a vector exceeds the threshold, else `0`.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPredictor {
    sum_threshold: f64,
}

impl ThresholdPredictor {
    pub fn new(sum_threshold: f64) -> Self {
        Self { sum_threshold }
    }
}

impl Default for ThresholdPredictor {
    fn default() -> Self {
        Self::new(DEFAULT_SUM_THRESHOLD)
    }
}

impl Predictor for ThresholdPredictor {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn predict(&self, instances: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        Ok(instances
            .iter()
            .map(|row| Prediction::from(row.iter().sum::<f64>() > self.sum_threshold))
            .collect())
    }
}

/// Flags drift when any single value in the batch exceeds the threshold.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdDriftDetector {
    value_threshold: f64,
}

impl ThresholdDriftDetector {
    pub fn new(value_threshold: f64) -> Self {
        Self { value_threshold }
    }
}

impl Default for ThresholdDriftDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_THRESHOLD)
    }
}

impl DriftDetector for ThresholdDriftDetector {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn check(&self, instances: &[Vec<f64>]) -> Result<bool> {
        for (row_idx, row) in instances.iter().enumerate() {
            if let Some(v) = row.iter().find(|v| **v > self.value_threshold) {
                tracing::debug!(row = row_idx, value = %v, threshold = %self.value_threshold, "drift value over threshold");
                return Ok(true);
            }
        }
        Ok(false)
    }
}
