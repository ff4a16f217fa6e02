//! modelserve gateway library entry.
//!
//! This crate wires config, the metrics registry, the inference service and
//! the HTTP routes into the serving process. It is consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod predict;
pub mod router;

use tokio::net::TcpListener;

use modelserve_core::error::{ModelServeError, Result};

/// Serve the router on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: app_state::AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = router::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ModelServeError::Internal(format!("server failed: {e}")))
}
