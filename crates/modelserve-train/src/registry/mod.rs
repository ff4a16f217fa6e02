//! Tracking server / model registry seam.
//!
//! The job only talks to `dyn Registry`. [`MlflowClient`] speaks the MLflow
//! REST API; [`InMemoryRegistry`] keeps everything in process and backs both
//! `--dry-run` and the tests.

pub mod memory;
pub mod mlflow;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

pub use memory::InMemoryRegistry;
pub use mlflow::MlflowClient;

/// Lifecycle stage of a registered model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    None,
    Staging,
    Production,
    Archived,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal (or running) state of a tracking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Identity of a run and where its artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    pub artifact_uri: String,
}

impl RunInfo {
    /// `runs:/<run_id>/<path>` URI of an artifact directory.
    pub fn artifact_ref(&self, path: &str) -> String {
        format!("runs:/{}/{}", self.run_id, path)
    }

    /// Storage location of an artifact directory.
    pub fn artifact_location(&self, path: &str) -> String {
        format!("{}/{}", self.artifact_uri.trim_end_matches('/'), path)
    }
}

/// A registered model version as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    /// Registry-assigned, string-encoded positive integer.
    pub version: String,
    #[serde(default = "default_stage")]
    pub current_stage: Stage,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_stage() -> Stage {
    Stage::None
}

impl ModelVersion {
    pub fn version_number(&self) -> Result<u64> {
        self.version.parse().map_err(|_| {
            TrainError::Registry(format!(
                "model {} has non-numeric version {:?}",
                self.name, self.version
            ))
        })
    }
}

/// Pick the version with the numerically largest version id.
pub fn latest_version(versions: &[ModelVersion]) -> Result<Option<&ModelVersion>> {
    let mut latest: Option<(u64, &ModelVersion)> = None;
    for v in versions {
        let n = v.version_number()?;
        if latest.map_or(true, |(best, _)| n > best) {
            latest = Some((n, v));
        }
    }
    Ok(latest.map(|(_, v)| v))
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Resolve an experiment id by name, creating the experiment if missing.
    async fn get_or_create_experiment(&self, name: &str) -> Result<String>;

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo>;

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()>;

    async fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()>;

    /// Store `body` at `path` relative to the run's artifact root.
    async fn upload_artifact(&self, run: &RunInfo, path: &str, body: Bytes) -> Result<()>;

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Register `source` as a new version of `name` (creating the registered
    /// model when needed) and return the assigned version.
    async fn create_model_version(&self, name: &str, source: &str, run_id: &str)
        -> Result<ModelVersion>;

    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;

    async fn transition_stage(
        &self,
        name: &str,
        version: &str,
        stage: Stage,
        archive_existing: bool,
    ) -> Result<ModelVersion>;
}
