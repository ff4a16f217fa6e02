use std::sync::Arc;
use std::time::Instant;

use modelserve_core::error::{ModelServeError, Result};
use modelserve_core::protocol::{PredictRequest, PredictResponse};
use modelserve_core::{DriftDetector, Predictor};

use crate::obs::InferenceMetrics;

/// Endpoint label used in request metrics.
pub const PREDICT_ENDPOINT: &str = "/predict";

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// Runs drift detection and prediction for a batch and records metrics.
///
/// Every call records exactly one latency observation and exactly one
/// request counter increment (`success` or `error`). Failures are logged and
/// returned to the caller unchanged.
pub struct InferenceService {
    predictor: Arc<dyn Predictor>,
    drift: Arc<dyn DriftDetector>,
    metrics: Arc<InferenceMetrics>,
}

impl InferenceService {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        drift: Arc<dyn DriftDetector>,
        metrics: Arc<InferenceMetrics>,
    ) -> Self {
        Self { predictor, drift, metrics }
    }

    pub fn predict(&self, req: &PredictRequest) -> Result<PredictResponse> {
        let started = Instant::now();

        let outcome = self.run(&req.instances);
        match &outcome {
            Ok(_) => {
                self.metrics
                    .requests
                    .inc(&[("endpoint", PREDICT_ENDPOINT), ("status", STATUS_SUCCESS)]);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    code = e.client_code().as_str(),
                    predictor = self.predictor.name(),
                    drift_detector = self.drift.name(),
                    instances = req.instances.len(),
                    "predict_failed"
                );
                self.metrics
                    .requests
                    .inc(&[("endpoint", PREDICT_ENDPOINT), ("status", STATUS_ERROR)]);
            }
        }

        self.metrics
            .request_latency
            .observe(&[("endpoint", PREDICT_ENDPOINT)], started.elapsed());

        outcome
    }

    fn run(&self, instances: &[Vec<f64>]) -> Result<PredictResponse> {
        tracing::info!(?instances, "request.instances");

        let drift_detected = self.drift.check(instances)?;
        if drift_detected {
            self.metrics.drift_detected.inc();
            tracing::warn!(detector = self.drift.name(), "drift detected");
        }

        let predictions = self.predictor.predict(instances)?;
        if predictions.len() != instances.len() {
            return Err(ModelServeError::Inference(format!(
                "predictor {} returned {} outputs for {} instances",
                self.predictor.name(),
                predictions.len(),
                instances.len()
            )));
        }

        tracing::info!(?predictions, drift_detected, "response.predictions");

        Ok(PredictResponse { predictions, drift_detected })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use modelserve_core::inference::{ThresholdDriftDetector, ThresholdPredictor};
    use modelserve_core::Prediction;

    struct FailingPredictor;

    impl Predictor for FailingPredictor {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn predict(&self, _instances: &[Vec<f64>]) -> Result<Vec<Prediction>> {
            Err(ModelServeError::Inference("model exploded".into()))
        }
    }

    struct ShortPredictor;

    impl Predictor for ShortPredictor {
        fn name(&self) -> &'static str {
            "short"
        }
        fn predict(&self, _instances: &[Vec<f64>]) -> Result<Vec<Prediction>> {
            Ok(vec![])
        }
    }

    fn service(predictor: Arc<dyn Predictor>) -> (InferenceService, Arc<InferenceMetrics>) {
        let metrics = Arc::new(InferenceMetrics::new());
        let svc = InferenceService::new(
            predictor,
            Arc::new(ThresholdDriftDetector::default()),
            Arc::clone(&metrics),
        );
        (svc, metrics)
    }

    fn req(instances: Vec<Vec<f64>>) -> PredictRequest {
        PredictRequest { instances }
    }

    const SUCCESS: [(&str, &str); 2] = [("endpoint", PREDICT_ENDPOINT), ("status", "success")];
    const ERROR: [(&str, &str); 2] = [("endpoint", PREDICT_ENDPOINT), ("status", "error")];
    const LATENCY: [(&str, &str); 1] = [("endpoint", PREDICT_ENDPOINT)];

    #[test]
    fn success_counts_once_and_observes_latency() {
        let (svc, metrics) = service(Arc::new(ThresholdPredictor::default()));

        let resp = svc.predict(&req(vec![vec![5.0, 6.0, 1.0]])).unwrap();
        assert_eq!(resp.predictions, vec![1]);
        assert!(!resp.drift_detected);

        assert_eq!(metrics.requests.get(&SUCCESS), 1);
        assert_eq!(metrics.requests.get(&ERROR), 0);
        assert_eq!(metrics.request_latency.count(&LATENCY), 1);
        assert_eq!(metrics.drift_detected.get(), 0);
    }

    #[test]
    fn drift_increments_drift_counter() {
        let (svc, metrics) = service(Arc::new(ThresholdPredictor::default()));

        let resp = svc.predict(&req(vec![vec![50.0, 160.0]])).unwrap();
        assert!(resp.drift_detected);
        assert_eq!(metrics.drift_detected.get(), 1);

        svc.predict(&req(vec![vec![1.0]])).unwrap();
        assert_eq!(metrics.drift_detected.get(), 1);
    }

    #[test]
    fn failure_is_counted_observed_and_returned() {
        let (svc, metrics) = service(Arc::new(FailingPredictor));

        let err = svc.predict(&req(vec![vec![1.0]])).unwrap_err();
        assert_eq!(err.client_code().as_str(), "INFERENCE_FAILED");

        assert_eq!(metrics.requests.get(&ERROR), 1);
        assert_eq!(metrics.requests.get(&SUCCESS), 0);
        assert_eq!(metrics.request_latency.count(&LATENCY), 1);
    }

    #[test]
    fn drift_is_counted_even_when_prediction_fails() {
        let (svc, metrics) = service(Arc::new(FailingPredictor));

        assert!(svc.predict(&req(vec![vec![500.0]])).is_err());
        assert_eq!(metrics.drift_detected.get(), 1);
    }

    #[test]
    fn output_length_mismatch_is_an_error() {
        let (svc, metrics) = service(Arc::new(ShortPredictor));

        let err = svc.predict(&req(vec![vec![1.0], vec![2.0]])).unwrap_err();
        assert!(err.to_string().contains("returned 0 outputs for 2 instances"));
        assert_eq!(metrics.requests.get(&ERROR), 1);
    }

    #[test]
    fn empty_batch_is_a_success() {
        let (svc, metrics) = service(Arc::new(ThresholdPredictor::default()));

        let resp = svc.predict(&req(vec![])).unwrap();
        assert!(resp.predictions.is_empty());
        assert!(!resp.drift_detected);
        assert_eq!(metrics.requests.get(&SUCCESS), 1);
    }
}
