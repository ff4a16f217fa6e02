//! In-process metrics for the serving process.
//!
//! Metrics are stored as atomics in sharded maps owned by `AppState` and
//! rendered by the `/metrics` handler in Prometheus text format.

pub mod metrics;

pub use metrics::{Counter, CounterVec, HistogramVec, InferenceMetrics};
