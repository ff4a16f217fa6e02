//! MLflow REST client (tracking + model registry + proxied artifacts).

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, TrainError};

use super::{ModelVersion, Registry, RunInfo, RunStatus, Stage};

const API: &str = "api/2.0/mlflow";
const ARTIFACTS_API: &str = "api/2.0/mlflow-artifacts/artifacts";

const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";
const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

/// How long `create_model_version` waits for a pending registration.
const REGISTRATION_POLLS: u32 = 300;
const REGISTRATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct MlflowClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ExperimentEnvelope {
    experiment: Experiment,
}

#[derive(Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct RunEnvelope {
    run: Run,
}

#[derive(Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Deserialize)]
struct ModelVersionEnvelope {
    model_version: ModelVersion,
}

#[derive(Deserialize)]
struct SearchModelVersionsResponse {
    #[serde(default)]
    model_versions: Vec<ModelVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
struct TransitionRequest<'a> {
    name: &'a str,
    version: &'a str,
    stage: &'a str,
    archive_existing_versions: bool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Where an artifact of a run has to be written.
#[derive(Debug, PartialEq, Eq)]
enum ArtifactTarget {
    /// Path below the tracking server's artifact proxy.
    Proxied(String),
    /// Local filesystem path (`file://` or bare absolute path).
    Local(PathBuf),
}

fn artifact_target(location: &str) -> Result<ArtifactTarget> {
    if let Some(rest) = location.strip_prefix("mlflow-artifacts:") {
        // mlflow-artifacts:/path or mlflow-artifacts://host:port/path
        let path = match rest.strip_prefix("//") {
            Some(with_host) => with_host.split_once('/').map(|(_, p)| p).unwrap_or(""),
            None => rest.trim_start_matches('/'),
        };
        return Ok(ArtifactTarget::Proxied(path.to_string()));
    }
    if let Some(path) = location.strip_prefix("file://") {
        return Ok(ArtifactTarget::Local(PathBuf::from(path)));
    }
    if location.starts_with('/') {
        return Ok(ArtifactTarget::Local(PathBuf::from(location)));
    }
    Err(TrainError::Registry(format!(
        "unsupported artifact location: {location}"
    )))
}

impl MlflowClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, API, endpoint)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => (body.error_code, body.message),
            Err(_) => (String::new(), text),
        };
        Err(TrainError::Api { status, code, message })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self.client.post(self.url(endpoint)).json(body).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn get<T>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.client.get(self.url(endpoint)).query(query).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn ensure_registered_model(&self, name: &str) -> Result<()> {
        match self
            .post::<_, Empty>("registered-models/create", &json!({ "name": name }))
            .await
        {
            Ok(_) => {
                tracing::info!(model = name, "registered model created");
                Ok(())
            }
            Err(e) if e.api_code() == Some(RESOURCE_ALREADY_EXISTS) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn await_ready(&self, mut mv: ModelVersion) -> Result<ModelVersion> {
        for _ in 0..REGISTRATION_POLLS {
            match mv.status.as_deref() {
                Some("PENDING_REGISTRATION") => {}
                Some("FAILED_REGISTRATION") => {
                    return Err(TrainError::Registry(format!(
                        "registration of {} v{} failed",
                        mv.name, mv.version
                    )));
                }
                _ => return Ok(mv),
            }
            tracing::debug!(model = %mv.name, version = %mv.version, "waiting for registration");
            tokio::time::sleep(REGISTRATION_POLL_INTERVAL).await;
            let env: ModelVersionEnvelope = self
                .get(
                    "model-versions/get",
                    &[("name", mv.name.as_str()), ("version", mv.version.as_str())],
                )
                .await?;
            mv = env.model_version;
        }
        Err(TrainError::Registry(format!(
            "registration of {} v{} still pending",
            mv.name, mv.version
        )))
    }
}

#[async_trait]
impl Registry for MlflowClient {
    async fn get_or_create_experiment(&self, name: &str) -> Result<String> {
        match self
            .get::<ExperimentEnvelope>("experiments/get-by-name", &[("experiment_name", name)])
            .await
        {
            Ok(env) => return Ok(env.experiment.experiment_id),
            Err(e) if e.api_code() == Some(RESOURCE_DOES_NOT_EXIST) => {}
            Err(e) => return Err(e),
        }

        let created: CreateExperimentResponse = self
            .post("experiments/create", &json!({ "name": name }))
            .await?;
        tracing::info!(experiment = name, id = %created.experiment_id, "experiment created");
        Ok(created.experiment_id)
    }

    async fn create_run(&self, experiment_id: &str) -> Result<RunInfo> {
        let env: RunEnvelope = self
            .post(
                "runs/create",
                &json!({ "experiment_id": experiment_id, "start_time": now_ms() }),
            )
            .await?;
        Ok(env.run.info)
    }

    async fn log_param(&self, run_id: &str, key: &str, value: &str) -> Result<()> {
        self.post::<_, Empty>(
            "runs/log-parameter",
            &json!({ "run_id": run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn log_metric(&self, run_id: &str, key: &str, value: f64) -> Result<()> {
        self.post::<_, Empty>(
            "runs/log-metric",
            &json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": now_ms(),
                "step": 0,
            }),
        )
        .await?;
        Ok(())
    }

    async fn upload_artifact(&self, run: &RunInfo, path: &str, body: Bytes) -> Result<()> {
        match artifact_target(&run.artifact_location(path))? {
            ArtifactTarget::Proxied(rel) => {
                let url = format!("{}/{}/{}", self.base_url, ARTIFACTS_API, rel);
                let resp = self.client.put(url).body(body).send().await?;
                Self::check(resp).await?;
            }
            ArtifactTarget::Local(file) => {
                if let Some(dir) = file.parent() {
                    tokio::fs::create_dir_all(dir).await?;
                }
                tokio::fs::write(&file, &body).await?;
            }
        }
        tracing::debug!(run_id = %run.run_id, path, "artifact uploaded");
        Ok(())
    }

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<()> {
        self.post::<_, Empty>(
            "runs/update",
            &json!({ "run_id": run_id, "status": status, "end_time": now_ms() }),
        )
        .await?;
        Ok(())
    }

    async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion> {
        self.ensure_registered_model(name).await?;
        let env: ModelVersionEnvelope = self
            .post(
                "model-versions/create",
                &json!({ "name": name, "source": source, "run_id": run_id }),
            )
            .await?;
        self.await_ready(env.model_version).await
    }

    async fn search_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let filter = format!("name='{name}'");
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("filter", filter.as_str())];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }
            let page: SearchModelVersionsResponse =
                self.get("model-versions/search", &query).await?;
            out.extend(page.model_versions);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn transition_stage(
        &self,
        name: &str,
        version: &str,
        stage: Stage,
        archive_existing: bool,
    ) -> Result<ModelVersion> {
        let env: ModelVersionEnvelope = self
            .post(
                "model-versions/transition-stage",
                &TransitionRequest {
                    name,
                    version,
                    stage: stage.as_str(),
                    archive_existing_versions: archive_existing,
                },
            )
            .await?;
        Ok(env.model_version)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn proxied_artifact_paths() {
        assert_eq!(
            artifact_target("mlflow-artifacts:/1/abc/artifacts/model/MLmodel").unwrap(),
            ArtifactTarget::Proxied("1/abc/artifacts/model/MLmodel".into())
        );
        assert_eq!(
            artifact_target("mlflow-artifacts://tracking:5000/1/abc/artifacts/x").unwrap(),
            ArtifactTarget::Proxied("1/abc/artifacts/x".into())
        );
    }

    #[test]
    fn local_artifact_paths() {
        assert_eq!(
            artifact_target("file:///tmp/mlruns/1/abc/artifacts/x").unwrap(),
            ArtifactTarget::Local(PathBuf::from("/tmp/mlruns/1/abc/artifacts/x"))
        );
        assert_eq!(
            artifact_target("/srv/mlruns/x").unwrap(),
            ArtifactTarget::Local(PathBuf::from("/srv/mlruns/x"))
        );
    }

    #[test]
    fn remote_stores_are_unsupported() {
        assert!(artifact_target("s3://bucket/x").is_err());
    }

    #[test]
    fn run_status_wire_names() {
        assert_eq!(serde_json::to_value(RunStatus::Finished).unwrap(), json!("FINISHED"));
        assert_eq!(serde_json::to_value(RunStatus::Failed).unwrap(), json!("FAILED"));
    }
}
