//! Prediction pipeline: the observability wrapper around the inference
//! capabilities and its HTTP handler.

pub mod handler;
pub mod service;

pub use service::{InferenceService, PREDICT_ENDPOINT};
