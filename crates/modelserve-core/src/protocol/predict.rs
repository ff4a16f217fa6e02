//! `/predict` and `/health` payloads.

use serde::{Deserialize, Serialize};

use crate::inference::Prediction;

/// Body of `POST /predict`. Fields other than `instances` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Feature vectors, one per prediction. Vector length is not checked.
    pub instances: Vec<Vec<f64>>,
}

/// Response of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// One output per input vector, same order.
    pub predictions: Vec<Prediction>,
    /// Batch-wide drift flag.
    #[serde(default)]
    pub drift_detected: bool,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}
