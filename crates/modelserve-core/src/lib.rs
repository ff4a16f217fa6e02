//! modelserve core: wire types, error surface, and inference capabilities.
//!
//! This crate defines the request/response contracts of the prediction
//! endpoint, the shared error type, and the `Predictor` / `DriftDetector`
//! traits the gateway is built against. It carries no transport or runtime
//! dependencies so the same types can be reused by the server, the training
//! job, and client tooling.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `ModelServeError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod inference;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, ModelServeError, Result};
pub use inference::{DriftDetector, Prediction, Predictor};
