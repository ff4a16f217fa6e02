//! modelserve-train
//!
//! Env: `MLFLOW_TRACKING_URI`, `MLFLOW_EXPERIMENT`, `MODEL_NAME`,
//! `PROMOTE_TO_PROD`, `LOG_LEVEL`. `--dry-run` keeps everything in memory.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use modelserve_train::registry::{InMemoryRegistry, MlflowClient, Registry};
use modelserve_train::{run_job, Result, TrainConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = TrainConfig::parse();

    // Report lines go to stdout; logs stay on stderr.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| cfg.filter_directive().map(EnvFilter::new))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry: Box<dyn Registry> = if cfg.dry_run {
        tracing::info!("dry run: using in-memory registry");
        Box::new(InMemoryRegistry::new())
    } else {
        tracing::info!(tracking_uri = %cfg.tracking_uri, "using tracking server");
        Box::new(MlflowClient::new(&cfg.tracking_uri))
    };

    let mut stdout = std::io::stdout().lock();
    run_job(&cfg, registry.as_ref(), &mut stdout).await?;
    Ok(())
}
