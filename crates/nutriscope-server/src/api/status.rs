//! API status endpoint

use crate::api::AppState;
use crate::monitor::MetricsSnapshot;
use axum::{extract::State, Json};

/// Request telemetry since process start
pub async fn get_status(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot().await)
}
