//! Inference capabilities behind the prediction endpoint.
//!
//! The gateway only talks to `dyn Predictor` and `dyn DriftDetector`, so the
//! placeholder threshold rules in [`threshold`] can be replaced by a real
//! model without touching the endpoint contract.

pub mod threshold;

use crate::error::Result;

pub use threshold::{ThresholdDriftDetector, ThresholdPredictor};

/// A single model output (class label).
pub type Prediction = u32;

/// Produces one prediction per feature vector, in input order.
pub trait Predictor: Send + Sync {
    fn name(&self) -> &'static str;
    fn predict(&self, instances: &[Vec<f64>]) -> Result<Vec<Prediction>>;
}

/// Decides whether a batch of inputs looks out of distribution.
pub trait DriftDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, instances: &[Vec<f64>]) -> Result<bool>;
}
