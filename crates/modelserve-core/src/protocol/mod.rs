//! Wire formats of the HTTP surface.
//!
//! JSON bodies are decoded strictly (`deny_unknown_fields`), so a typo in a
//! request field is reported instead of silently ignored.

pub mod predict;

pub use predict::{HealthResponse, PredictRequest, PredictResponse};
