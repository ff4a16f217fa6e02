//! In-process registry with MLflow's stage semantics.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, TrainError};

use super::{ModelVersion, Registry, RunInfo, RunStatus, Stage};

/// Everything recorded against one run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub info: RunInfo,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Default)]
struct State {
    experiments: Vec<String>,
    runs: HashMap<String, RunRecord>,
    artifacts: BTreeMap<String, Bytes>,
    models: BTreeMap<String, Vec<ModelVersion>>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| TrainError::Registry("in-memory registry lock poisoned".into()))
    }

    pub fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.lock().ok()?.runs.get(run_id).cloned()
    }

    /// Artifact stored at `location` (`<artifact_uri>/<path>`).
    pub fn artifact(&self, location: &str) -> Option<Bytes> {
        self.lock().ok()?.artifacts.get(location).cloned()
    }

    pub fn versions(&self, name: &str) -> Vec<ModelVersion> {
        self.lock()
            .map(|s| s.models.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Pre-populate a version, e.g. one already serving in production.
    pub fn seed_version(&self, name: &str, stage: Stage) -> Result<ModelVersion> {
        let mut state = self.lock()?;
        let versions = state.models.entry(name.to_string()).or_default();
        let mv = ModelVersion {
            name: name.to_string(),
            version: (versions.len() + 1).to_string(),
            current_stage: stage,
            run_id: None,
            source: None,
            status: Some("READY".into()),
        };
        versions.push(mv.clone());
        Ok(mv)
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn get_or_create_experiment(&self, name: &str) -> Result<String> {
        let mut state = self.lock()?;
        let idx = match state.experiments.iter().position(|e| e == name) {
            Some(idx) => idx,
            None => {
                state.experiments.push(name.to_string());
                state.experiments.len() - 1
            }
        };
        Ok(idx.to_string())
    }

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo> {
        let mut state = self.lock()?;
        let run_id = format!("run{:04}", state.runs.len() + 1);
        let info = RunInfo {
            artifact_uri: format!("memory:/{experiment_id}/{run_id}/artifacts"),
            run_id: run_id.clone(),
            experiment_id: experiment_id.to_string(),
        };
        state.runs.insert(
            run_id,
            RunRecord {
                info: info.clone(),
                status: RunStatus::Running,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
            },
        );
        Ok(info)
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock()?;
        let run = run_mut(&mut state, run_id)?;
        run.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        let mut state = self.lock()?;
        let run = run_mut(&mut state, run_id)?;
        run.metrics.insert(key.to_string(), value);
        Ok(())
    }

    async fn upload_artifact(&self, run: &RunInfo, path: &str, body: Bytes) -> Result<()> {
        let mut state = self.lock()?;
        run_mut(&mut state, &run.run_id)?;
        state.artifacts.insert(run.artifact_location(path), body);
        Ok(())
    }

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        let mut state = self.lock()?;
        run_mut(&mut state, run_id)?.status = status;
        Ok(())
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        let mut state = self.lock()?;
        run_mut(&mut state, run_id)?;
        let versions = state.models.entry(name.to_string()).or_default();
        let mv = ModelVersion {
            name: name.to_string(),
            version: (versions.len() + 1).to_string(),
            current_stage: Stage::None,
            run_id: Some(run_id.to_string()),
            source: Some(source.to_string()),
            status: Some("READY".into()),
        };
        versions.push(mv.clone());
        Ok(mv)
    }

    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        Ok(self.versions(name))
    }

    async fn transition_stage(
        &self,
        name: &str,
        version: &str,
        stage: Stage,
        archive_existing: bool,
    ) -> Result<ModelVersion> {
        let mut state = self.lock()?;
        let versions = state
            .models
            .get_mut(name)
            .ok_or_else(|| TrainError::Registry(format!("registered model not found: {name}")))?;

        if !versions.iter().any(|v| v.version == version) {
            return Err(TrainError::Registry(format!("model version not found: {name} v{version}")));
        }

        let archives = archive_existing && matches!(stage, Stage::Staging | Stage::Production);
        let mut updated = None;
        for v in versions.iter_mut() {
            if v.version == version {
                v.current_stage = stage;
                updated = Some(v.clone());
            } else if archives && v.current_stage == stage {
                v.current_stage = Stage::Archived;
            }
        }
        updated.ok_or_else(|| TrainError::Registry(format!("model version not found: {name} v{version}")))
    }
}

fn run_mut<'a>(state: &'a mut State, run_id: &str) -> Result<&'a mut RunRecord> {
    state
        .runs
        .get_mut(run_id)
        .ok_or_else(|| TrainError::Registry(format!("run not found: {run_id}")))
}
