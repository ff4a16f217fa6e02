//! Job configuration: command line flags backed by environment variables.

use clap::{ArgAction, Parser};

use crate::error::{Result, TrainError};

pub const DEFAULT_TRACKING_URI: &str = "http://localhost:5000";
pub const DEFAULT_EXPERIMENT: &str = "iris_rf_experiment";
pub const DEFAULT_MODEL_NAME: &str = "iris_rf_model";

/// Train a random forest on iris and register it in the model registry.
#[derive(Debug, Clone, Parser)]
#[command(name = "modelserve-train", version, about, long_about = None)]
pub struct TrainConfig {
    /// Tracking / registry server URI
    #[arg(long, env = "MLFLOW_TRACKING_URI", default_value = DEFAULT_TRACKING_URI)]
    pub tracking_uri: String,

    /// Experiment the run is recorded under (created when missing)
    #[arg(long, env = "MLFLOW_EXPERIMENT", default_value = DEFAULT_EXPERIMENT)]
    pub experiment: String,

    /// Registered model name
    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model_name: String,

    /// Promote the newest version to Production; only "true" (any case) enables it
    #[arg(
        long,
        env = "PROMOTE_TO_PROD",
        default_value = "true",
        value_parser = parse_flag,
        action = ArgAction::Set
    )]
    pub promote_to_prod: bool,

    /// Log verbosity (TRACE, DEBUG, INFO, WARNING, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Run against an in-memory registry instead of the tracking server
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub params: TrainParams,
}

/// Fixed hyperparameters of the job.
#[derive(Debug, Clone, Copy, PartialEq, clap::Args)]
pub struct TrainParams {
    /// Number of trees
    #[arg(long, default_value_t = 100)]
    pub n_estimators: usize,

    /// Maximum tree depth
    #[arg(long, default_value_t = 3)]
    pub max_depth: usize,

    /// Seed for the split and the forest
    #[arg(long, default_value_t = 42)]
    pub random_state: u64,

    /// Held-out fraction
    #[arg(long, default_value_t = 0.25)]
    pub test_size: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            random_state: 42,
            test_size: 0.25,
        }
    }
}

impl TrainParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TrainError::Config("n_estimators must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(TrainError::Config("max_depth must be at least 1".into()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainError::Config("test_size must be in (0, 1)".into()));
        }
        Ok(())
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(TrainError::Config("model name must not be empty".into()));
        }
        if self.experiment.trim().is_empty() {
            return Err(TrainError::Config("experiment name must not be empty".into()));
        }
        if !self.dry_run && !self.tracking_uri.starts_with("http") {
            return Err(TrainError::Config(format!(
                "tracking uri must be http(s): {}",
                self.tracking_uri
            )));
        }
        self.params.validate()
    }

    /// Map the configured level onto a `tracing` filter directive.
    pub fn filter_directive(&self) -> Result<&'static str> {
        match self.log_level.to_ascii_uppercase().as_str() {
            "TRACE" => Ok("trace"),
            "DEBUG" => Ok("debug"),
            "INFO" => Ok("info"),
            "WARN" | "WARNING" => Ok("warn"),
            "ERROR" | "CRITICAL" | "FATAL" => Ok("error"),
            other => Err(TrainError::Config(format!("unknown log level: {other}"))),
        }
    }
}

fn parse_flag(s: &str) -> std::result::Result<bool, std::convert::Infallible> {
    Ok(s.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn promote_flag_only_accepts_true() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("1").unwrap());
        assert!(!parse_flag("yes").unwrap());
        assert!(!parse_flag("false").unwrap());
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = TrainConfig::try_parse_from([
            "modelserve-train",
            "--model-name",
            "m",
            "--promote-to-prod",
            "False",
            "--n-estimators",
            "7",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cfg.model_name, "m");
        assert!(!cfg.promote_to_prod);
        assert!(cfg.dry_run);
        assert_eq!(cfg.params.n_estimators, 7);
        assert_eq!(cfg.params.max_depth, 3);
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_params_are_rejected() {
        let mut p = TrainParams::default();
        p.test_size = 1.0;
        assert!(p.validate().is_err());
        p = TrainParams { max_depth: 0, ..TrainParams::default() };
        assert!(p.validate().is_err());
    }
}
