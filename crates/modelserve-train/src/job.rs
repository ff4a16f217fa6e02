//! The training job: fit, log, register, promote.

use std::io::Write;

use crate::artifact::{model_path, ModelArtifact, DESCRIPTOR_FILE, MODEL_DIR, MODEL_FILE};
use crate::config::TrainConfig;
use crate::dataset::{train_test_split, Dataset, Split};
use crate::error::{Result, TrainError};
use crate::forest::{accuracy_score, ForestParams, RandomForest};
use crate::registry::{latest_version, Registry, RunInfo, RunStatus, Stage};

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub run_id: String,
    pub model_name: String,
    pub model_uri: String,
    pub version: String,
    pub accuracy: f64,
    /// Version moved to Production, when promotion is enabled.
    pub promoted: Option<String>,
}

/// Run the job once against `registry`, writing the human readable report
/// lines to `out`.
///
/// The run is closed as `FINISHED` on success and `FAILED` otherwise; the
/// job error wins over a failure to close the run.
pub async fn run_job(
    cfg: &TrainConfig,
    registry: &dyn Registry,
    out: &mut dyn Write,
) -> Result<TrainReport> {
    cfg.validate()?;

    let experiment_id = registry.get_or_create_experiment(&cfg.experiment).await?;

    let dataset = Dataset::iris()?;
    let split = train_test_split(&dataset, cfg.params.test_size, cfg.params.random_state)?;
    tracing::info!(
        train = split.x_train.len(),
        test = split.x_test.len(),
        "dataset split"
    );

    let run = registry.create_run(&experiment_id).await?;
    tracing::info!(run_id = %run.run_id, experiment_id = %experiment_id, "run started");

    let result = train_in_run(cfg, registry, &run, &dataset, &split, out).await;

    let status = if result.is_ok() { RunStatus::Finished } else { RunStatus::Failed };
    let closed = registry.set_run_status(&run.run_id, status).await;

    match (result, closed) {
        (Ok(report), Ok(())) => {
            tracing::info!(run_id = %report.run_id, accuracy = report.accuracy, "run finished");
            Ok(report)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => {
            tracing::error!(run_id = %run.run_id, error = %e, "run failed");
            Err(e)
        }
        (Err(e), Err(close_err)) => {
            tracing::warn!(run_id = %run.run_id, error = %close_err, "could not mark run failed");
            Err(e)
        }
    }
}

async fn train_in_run(
    cfg: &TrainConfig,
    registry: &dyn Registry,
    run: &RunInfo,
    dataset: &Dataset,
    split: &Split,
    out: &mut dyn Write,
) -> Result<TrainReport> {
    let params = ForestParams {
        n_estimators: cfg.params.n_estimators,
        max_depth: cfg.params.max_depth,
        seed: cfg.params.random_state,
    };
    let forest = RandomForest::fit(&split.x_train, &split.y_train, dataset.n_classes(), params)?;
    let accuracy = accuracy_score(&split.y_test, &forest.predict_batch(&split.x_test))?;
    tracing::info!(accuracy, trees = params.n_estimators, "model fitted");

    let run_id = run.run_id.as_str();
    registry
        .log_param(run_id, "n_estimators", &params.n_estimators.to_string())
        .await?;
    registry
        .log_param(run_id, "max_depth", &params.max_depth.to_string())
        .await?;
    registry
        .log_param(run_id, "random_state", &params.seed.to_string())
        .await?;
    registry.log_metric(run_id, "accuracy", accuracy).await?;

    let artifact = ModelArtifact::new(
        forest,
        dataset.feature_names.clone(),
        dataset.class_names.clone(),
    );
    registry
        .upload_artifact(run, &model_path(MODEL_FILE), artifact.to_bytes()?)
        .await?;
    registry
        .upload_artifact(run, &model_path(DESCRIPTOR_FILE), artifact.descriptor(run_id).to_bytes()?)
        .await?;

    let registered = registry
        .create_model_version(&cfg.model_name, &run.artifact_location(MODEL_DIR), run_id)
        .await?;
    tracing::info!(model = %cfg.model_name, version = %registered.version, "model version registered");

    let model_uri = run.artifact_ref(MODEL_DIR);
    writeln!(out, "Run ID: {run_id}")?;
    writeln!(out, "Registered model name: {}", cfg.model_name)?;
    writeln!(out, "Model URI: {model_uri}")?;

    let promoted = if cfg.promote_to_prod {
        Some(promote_latest(registry, &cfg.model_name, out).await?)
    } else {
        None
    };

    Ok(TrainReport {
        run_id: run_id.to_string(),
        model_name: cfg.model_name.clone(),
        model_uri,
        version: registered.version,
        accuracy,
        promoted,
    })
}

/// Move the numerically newest version of `name` to Production, archiving
/// whatever held that stage before.
async fn promote_latest(registry: &dyn Registry, name: &str, out: &mut dyn Write) -> Result<String> {
    let versions = registry.search_model_versions(name).await?;
    let latest = latest_version(&versions)?
        .ok_or_else(|| TrainError::Registry(format!("no versions found for model {name}")))?;

    let promoted = registry
        .transition_stage(name, &latest.version, Stage::Production, true)
        .await?;
    tracing::info!(model = name, version = %promoted.version, "promoted to production");
    writeln!(out, "Promoted {} v{} to Production", name, promoted.version)?;
    Ok(promoted.version)
}
