//! Training API endpoints for Nutriscope
//!
//! Starts simulated retraining jobs and reports their progress.

use crate::api::{field, json_body, AppState};
use crate::error::{ApiError, ApiResult};
use crate::training::{DatasetDescriptor, Job};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainResponse {
    pub message: String,
    pub training_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a retraining job
pub async fn retrain(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RetrainResponse>> {
    let body = json_body(body)?;
    let dataset = field(&body, "dataset")
        .map(|dataset| {
            serde_json::from_value::<DatasetDescriptor>(dataset)
                .map_err(|e| ApiError::Validation(format!("Invalid dataset: {}", e)))
        })
        .transpose()?;

    let training_id = state.jobs.create(dataset).await?;

    Ok(Json(RetrainResponse {
        message: "Retraining started successfully".to_string(),
        training_id,
    }))
}

/// Get a job snapshot by id
pub async fn training_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.get(&id).await?))
}

/// Get the snapshot of the most recently started job
pub async fn latest_training_status(State(state): State<AppState>) -> ApiResult<Json<Job>> {
    let id = state
        .jobs
        .most_recent()
        .await
        .ok_or_else(|| ApiError::NotFound("No training jobs have been started".to_string()))?;

    Ok(Json(state.jobs.get(&id).await?))
}

/// Cancel a running job
pub async fn stop_training(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.stop(&id).await?))
}
