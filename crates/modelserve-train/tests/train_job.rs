//! Full job runs against a mock MLflow server and the in-memory registry.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use modelserve_train::artifact::ModelArtifact;
use modelserve_train::config::{TrainParams, DEFAULT_EXPERIMENT};
use modelserve_train::registry::{InMemoryRegistry, MlflowClient, RunStatus, Stage};
use modelserve_train::{run_job, TrainConfig, TrainError};

const MODEL: &str = "iris_rf_model";

fn config(tracking_uri: &str, promote: bool, dry_run: bool) -> TrainConfig {
    TrainConfig {
        tracking_uri: tracking_uri.to_string(),
        experiment: DEFAULT_EXPERIMENT.to_string(),
        model_name: MODEL.to_string(),
        promote_to_prod: promote,
        log_level: "INFO".to_string(),
        dry_run,
        params: TrainParams::default(),
    }
}

// ---------------------------------------------------------------------------
// mock tracking server

#[derive(Default)]
struct Mock {
    experiments: BTreeMap<String, String>,
    runs: BTreeMap<String, Value>,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
    artifacts: BTreeMap<String, Bytes>,
    registered: Vec<String>,
    versions: Vec<Value>,
    fail_metrics: bool,
}

type Shared = Arc<Mutex<Mock>>;

fn api_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({"error_code": code, "message": message}))).into_response()
}

async fn get_experiment(
    State(m): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let m = m.lock().unwrap();
    let name = q.get("experiment_name").cloned().unwrap_or_default();
    match m.experiments.get(&name) {
        Some(id) => Json(json!({"experiment": {"experiment_id": id, "name": name}})).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST", "no such experiment"),
    }
}

async fn create_experiment(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let id = (m.experiments.len() + 1).to_string();
    m.experiments.insert(body["name"].as_str().unwrap().to_string(), id.clone());
    Json(json!({"experiment_id": id})).into_response()
}

async fn create_run(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let exp = body["experiment_id"].as_str().unwrap().to_string();
    let run_id = format!("run{}", m.runs.len() + 1);
    let info = json!({
        "run_id": run_id,
        "experiment_id": exp,
        "artifact_uri": format!("mlflow-artifacts:/{exp}/{run_id}/artifacts"),
        "status": "RUNNING",
        "lifecycle_stage": "active",
    });
    m.runs.insert(run_id, info.clone());
    Json(json!({"run": {"info": info, "data": {}}})).into_response()
}

async fn log_param(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    m.params.insert(
        body["key"].as_str().unwrap().to_string(),
        body["value"].as_str().unwrap().to_string(),
    );
    Json(json!({})).into_response()
}

async fn log_metric(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    if m.fail_metrics {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "store unavailable");
    }
    assert!(body["timestamp"].as_i64().unwrap() > 0);
    m.metrics.insert(body["key"].as_str().unwrap().to_string(), body["value"].as_f64().unwrap());
    Json(json!({})).into_response()
}

async fn update_run(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let run_id = body["run_id"].as_str().unwrap();
    let run = m.runs.get_mut(run_id).unwrap();
    run["status"] = body["status"].clone();
    let info = run.clone();
    Json(json!({"run_info": info})).into_response()
}

async fn put_artifact(State(m): State<Shared>, Path(path): Path<String>, body: Bytes) -> Response {
    m.lock().unwrap().artifacts.insert(path, body);
    StatusCode::OK.into_response()
}

async fn create_registered_model(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let name = body["name"].as_str().unwrap().to_string();
    if m.registered.contains(&name) {
        return api_error(StatusCode::BAD_REQUEST, "RESOURCE_ALREADY_EXISTS", "exists");
    }
    m.registered.push(name.clone());
    Json(json!({"registered_model": {"name": name}})).into_response()
}

async fn create_version(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let name = body["name"].as_str().unwrap();
    let next = m.versions.iter().filter(|v| v["name"] == name).count() + 1;
    let mv = json!({
        "name": name,
        "version": next.to_string(),
        "current_stage": "None",
        "run_id": body["run_id"],
        "source": body["source"],
        "status": "READY",
    });
    m.versions.push(mv.clone());
    Json(json!({"model_version": mv})).into_response()
}

/// Two versions per page so the client has to follow `next_page_token`.
async fn search_versions(
    State(m): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let m = m.lock().unwrap();
    let filter = q.get("filter").cloned().unwrap_or_default();
    let name = filter
        .strip_prefix("name='")
        .and_then(|s| s.strip_suffix('\''))
        .unwrap()
        .to_string();
    let start: usize = q.get("page_token").map(|t| t.parse().unwrap()).unwrap_or(0);
    let all: Vec<&Value> = m.versions.iter().filter(|v| v["name"] == name.as_str()).collect();
    let page: Vec<&Value> = all.iter().skip(start).take(2).copied().collect();
    let mut body = json!({"model_versions": page});
    if start + 2 < all.len() {
        body["next_page_token"] = json!((start + 2).to_string());
    }
    Json(body).into_response()
}

async fn transition(State(m): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut m = m.lock().unwrap();
    let name = body["name"].as_str().unwrap().to_string();
    let version = body["version"].as_str().unwrap().to_string();
    let stage = body["stage"].as_str().unwrap().to_string();
    let archive = body["archive_existing_versions"].as_bool().unwrap();

    let mut out = Value::Null;
    for v in m.versions.iter_mut().filter(|v| v["name"] == name.as_str()) {
        if v["version"] == version.as_str() {
            v["current_stage"] = json!(stage);
            out = v.clone();
        } else if archive && v["current_stage"] == stage.as_str() {
            v["current_stage"] = json!("Archived");
        }
    }
    Json(json!({"model_version": out})).into_response()
}

struct MockServer {
    base: String,
    state: Shared,
    _stop: oneshot::Sender<()>,
}

async fn start_mock(mock: Mock) -> MockServer {
    let state: Shared = Arc::new(Mutex::new(mock));
    let api = "/api/2.0/mlflow";
    let app = Router::new()
        .route(&format!("{api}/experiments/get-by-name"), get(get_experiment))
        .route(&format!("{api}/experiments/create"), post(create_experiment))
        .route(&format!("{api}/runs/create"), post(create_run))
        .route(&format!("{api}/runs/log-parameter"), post(log_param))
        .route(&format!("{api}/runs/log-metric"), post(log_metric))
        .route(&format!("{api}/runs/update"), post(update_run))
        .route(&format!("{api}/registered-models/create"), post(create_registered_model))
        .route(&format!("{api}/model-versions/create"), post(create_version))
        .route(&format!("{api}/model-versions/search"), get(search_versions))
        .route(&format!("{api}/model-versions/transition-stage"), post(transition))
        .route("/api/2.0/mlflow-artifacts/artifacts/*path", put(put_artifact))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await;
    });

    MockServer { base: format!("http://{addr}"), state, _stop: tx }
}

fn stages(m: &Mock) -> Vec<(String, String)> {
    m.versions
        .iter()
        .map(|v| {
            (
                v["version"].as_str().unwrap().to_string(),
                v["current_stage"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// mlflow

#[tokio::test]
async fn first_run_creates_experiment_and_promotes_v1() {
    let srv = start_mock(Mock::default()).await;
    let client = MlflowClient::new(&format!("{}/", srv.base));
    let mut out = Vec::new();

    let report = run_job(&config(&srv.base, true, false), &client, &mut out).await.unwrap();

    assert_eq!(report.run_id, "run1");
    assert_eq!(report.model_uri, "runs:/run1/model");
    assert_eq!(report.version, "1");
    assert_eq!(report.promoted.as_deref(), Some("1"));

    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "Run ID: run1\n\
         Registered model name: iris_rf_model\n\
         Model URI: runs:/run1/model\n\
         Promoted iris_rf_model v1 to Production\n"
    );

    let m = srv.state.lock().unwrap();
    assert_eq!(m.experiments.get(DEFAULT_EXPERIMENT).map(String::as_str), Some("1"));
    assert_eq!(m.runs["run1"]["status"], "FINISHED");
    assert_eq!(m.params["n_estimators"], "100");
    assert_eq!(m.params["max_depth"], "3");
    assert_eq!(m.params["random_state"], "42");
    assert_eq!(m.metrics["accuracy"], report.accuracy);

    let model = m.artifacts.get("1/run1/artifacts/model/model.json").unwrap();
    let artifact = ModelArtifact::from_slice(model).unwrap();
    assert_eq!(artifact.class_names.len(), 3);
    assert!(m.artifacts.contains_key("1/run1/artifacts/model/MLmodel"));

    assert_eq!(m.versions[0]["source"], "mlflow-artifacts:/1/run1/artifacts/model");
    assert_eq!(stages(&m), vec![("1".to_string(), "Production".to_string())]);
}

#[tokio::test]
async fn later_runs_archive_previous_production() {
    let srv = start_mock(Mock::default()).await;
    let client = MlflowClient::new(&srv.base);
    let cfg = config(&srv.base, true, false);

    let mut accuracies = Vec::new();
    for _ in 0..3 {
        let mut out = Vec::new();
        accuracies.push(run_job(&cfg, &client, &mut out).await.unwrap().accuracy);
    }

    // Fixed seeds: every run trains the same forest.
    assert!(accuracies.windows(2).all(|w| w[0] == w[1]));
    assert!(accuracies[0] >= 0.85);

    let m = srv.state.lock().unwrap();
    assert_eq!(m.experiments.len(), 1);
    assert_eq!(m.registered, vec![MODEL.to_string()]);
    assert_eq!(
        stages(&m),
        vec![
            ("1".to_string(), "Archived".to_string()),
            ("2".to_string(), "Archived".to_string()),
            ("3".to_string(), "Production".to_string()),
        ]
    );
}

#[tokio::test]
async fn promotion_can_be_disabled() {
    let srv = start_mock(Mock::default()).await;
    let client = MlflowClient::new(&srv.base);
    let mut out = Vec::new();

    let report = run_job(&config(&srv.base, false, false), &client, &mut out).await.unwrap();
    assert!(report.promoted.is_none());
    assert!(!String::from_utf8(out).unwrap().contains("Promoted"));

    let m = srv.state.lock().unwrap();
    assert_eq!(stages(&m), vec![("1".to_string(), "None".to_string())]);
}

#[tokio::test]
async fn api_failure_marks_run_failed() {
    let srv = start_mock(Mock { fail_metrics: true, ..Mock::default() }).await;
    let client = MlflowClient::new(&srv.base);
    let mut out = Vec::new();

    let err = run_job(&config(&srv.base, true, false), &client, &mut out).await.unwrap_err();
    match err {
        TrainError::Api { status, ref code, ref message } => {
            assert_eq!(status, 500);
            assert_eq!(code, "INTERNAL_ERROR");
            assert_eq!(message, "store unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.is_empty());

    let m = srv.state.lock().unwrap();
    assert_eq!(m.runs["run1"]["status"], "FAILED");
    assert!(m.versions.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_an_http_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = MlflowClient::new(&base);
    let mut out = Vec::new();
    let err = run_job(&config(&base, true, false), &client, &mut out).await.unwrap_err();
    assert!(matches!(err, TrainError::Http(_)));
}

// ---------------------------------------------------------------------------
// in-memory

#[tokio::test]
async fn dry_run_against_memory_registry() {
    let registry = InMemoryRegistry::new();
    registry.seed_version(MODEL, Stage::Production).unwrap();
    let mut out = Vec::new();

    let report = run_job(&config("unused", true, true), &registry, &mut out).await.unwrap();
    assert_eq!(report.version, "2");
    assert_eq!(report.promoted.as_deref(), Some("2"));

    let run = registry.run(&report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.metrics["accuracy"], report.accuracy);
    assert!(registry
        .artifact(&run.info.artifact_location("model/model.json"))
        .is_some());

    let versions = registry.versions(MODEL);
    let production: Vec<_> = versions
        .iter()
        .filter(|v| v.current_stage == Stage::Production)
        .collect();
    assert_eq!(production.len(), 1);
    assert_eq!(production[0].version, "2");
    assert_eq!(versions[0].current_stage, Stage::Archived);
}

#[tokio::test]
async fn invalid_config_fails_before_any_registry_call() {
    let registry = InMemoryRegistry::new();
    let mut cfg = config("unused", true, true);
    cfg.model_name = " ".into();
    let mut out = Vec::new();

    let err = run_job(&cfg, &registry, &mut out).await.unwrap_err();
    assert!(matches!(err, TrainError::Config(_)));
    assert!(registry.versions(" ").is_empty());
}
