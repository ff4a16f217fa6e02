//! `POST /predict`.
//!
//! Body decoding (and its 4xx rejections) is left to axum's `Json`
//! extractor; malformed requests never reach the service or its metrics.

use axum::{extract::State, Json};

use modelserve_core::protocol::{PredictRequest, PredictResponse};

use crate::app_state::AppState;
use crate::error::ApiError;

pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let resp = state.inference().predict(&req)?;
    Ok(Json(resp))
}
