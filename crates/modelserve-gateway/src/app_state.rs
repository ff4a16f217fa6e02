//! Shared application state for the serving process.
//!
//! Owns the metrics registry and the inference service; handlers receive it
//! through axum `State`. Cloning is cheap (one `Arc`).

use std::sync::Arc;

use modelserve_core::error::Result;
use modelserve_core::inference::{ThresholdDriftDetector, ThresholdPredictor};
use modelserve_core::{DriftDetector, Predictor};

use crate::config::ServeConfig;
use crate::obs::InferenceMetrics;
use crate::predict::InferenceService;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServeConfig,
    metrics: Arc<InferenceMetrics>,
    inference: InferenceService,
}

impl AppState {
    /// Build state with the threshold predictor and drift detector from config.
    pub fn new(cfg: ServeConfig) -> Result<Self> {
        cfg.validate()?;
        let predictor = Arc::new(ThresholdPredictor::new(cfg.inference.sum_threshold));
        let drift = Arc::new(ThresholdDriftDetector::new(cfg.inference.drift_threshold));
        Ok(Self::with_components(cfg, predictor, drift))
    }

    /// Build state around caller-provided inference capabilities.
    pub fn with_components(
        cfg: ServeConfig,
        predictor: Arc<dyn Predictor>,
        drift: Arc<dyn DriftDetector>,
    ) -> Self {
        tracing::debug!(
            predictor = predictor.name(),
            drift_detector = drift.name(),
            "app state ready"
        );

        let metrics = Arc::new(InferenceMetrics::new());
        let inference = InferenceService::new(predictor, drift, Arc::clone(&metrics));

        Self {
            inner: Arc::new(AppStateInner { cfg, metrics, inference }),
        }
    }

    pub fn cfg(&self) -> &ServeConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<InferenceMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn inference(&self) -> &InferenceService {
        &self.inner.inference
    }
}
