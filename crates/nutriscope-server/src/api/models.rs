//! Model API endpoints for Nutriscope

use crate::api::{field, json_body, require, AppState};
use crate::error::ApiResult;
use crate::model::prediction::{self, Prediction};
use crate::model::ModelRecord;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfoResponse {
    #[serde(flatten)]
    pub model: ModelRecord,
    pub active_training_jobs: usize,
    pub total_training_jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Prediction,
}

/// Current model record with job counts
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let (counts, model) = state.jobs.counts_with_model().await;

    Json(ModelInfoResponse {
        model,
        active_training_jobs: counts.active,
        total_training_jobs: counts.total,
    })
}

/// Classify a patient record
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let body = json_body(body)?;
    let data = require(field(&body, "data"), "Missing data for prediction")?;

    let latency = Duration::from_millis(state.config.simulation.predict_latency_ms);
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    let prediction = prediction::predict(&data)?;
    Ok(Json(PredictResponse { prediction }))
}
