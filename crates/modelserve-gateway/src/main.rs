//! modelserve gateway
//!
//! - `GET  /health`  : liveness
//! - `GET  /metrics` : Prometheus exposition
//! - `POST /predict` : placeholder predictor + drift flag
//!
//! Config: `$MODELSERVE_CONFIG` (optional YAML), `LOG_LEVEL`, `LISTEN_ADDR`.

use tracing_subscriber::{fmt, EnvFilter};

use modelserve_core::error::{ModelServeError, Result};
use modelserve_gateway::{app_state, config};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load_from_env()?;

    // RUST_LOG wins over LOG_LEVEL when set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| cfg.log.filter_directive().map(EnvFilter::new))?;
    fmt().with_env_filter(filter).init();

    let listen = cfg.server.listen_addr()?;
    let state = app_state::AppState::new(cfg)?;

    tracing::info!(%listen, "modelserve-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ModelServeError::Internal(format!("failed to bind {listen}: {e}")))?;

    modelserve_gateway::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("modelserve-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
