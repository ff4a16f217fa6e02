//! modelserve training job.
//!
//! Fits a seeded random forest on the embedded iris data, records the run
//! (params, accuracy, model artifact) in a tracking server, registers the
//! model and optionally promotes the newest version to Production.
//!
//! The registry is reached through the [`registry::Registry`] trait, so the
//! same job runs against MLflow or fully in process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod job;
pub mod registry;

pub use config::TrainConfig;
pub use error::{Result, TrainError};
pub use job::{run_job, TrainReport};
