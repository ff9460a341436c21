//! API routes module for Nutriscope Server
//!
//! Defines all REST API endpoints.

pub mod models;
pub mod status;
pub mod training;
pub mod visualization;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::model::ModelRegistry;
use crate::monitor::middleware::track_request;
use crate::monitor::MetricsAggregator;
use crate::training::job::is_blank;
use crate::training::{DriverConfig, JobRegistry};
use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jobs: Arc<JobRegistry>,
    pub models: Arc<ModelRegistry>,
    pub metrics: Arc<MetricsAggregator>,
    maintenance: Arc<Mutex<Option<JoinHandle<()>>>>,
    started_at: Instant,
}

impl AppState {
    /// Build every service from the configuration and start window maintenance.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config) -> ApiResult<Self> {
        let models = Arc::new(ModelRegistry::new(&config.model)?);
        let jobs = Arc::new(JobRegistry::new(
            models.clone(),
            DriverConfig::from(&config.training),
        ));
        let metrics = Arc::new(MetricsAggregator::new(config.metrics.window()));
        let maintenance = metrics
            .clone()
            .start_window_maintenance(config.metrics.maintenance_interval());

        Ok(Self {
            config: Arc::new(config),
            jobs,
            models,
            metrics,
            maintenance: Arc::new(Mutex::new(Some(maintenance))),
            started_at: Instant::now(),
        })
    }

    /// Stop every progress driver and the window maintenance task
    pub async fn shutdown(&self) {
        self.jobs.shutdown().await;
        if let Some(handle) = self.maintenance.lock().await.take() {
            handle.abort();
        }
        tracing::info!("Background tasks stopped");
    }

    /// Seconds since the state was created
    pub fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    // The dashboard is served from a different origin
    let cors = CorsLayer::permissive();

    let api_routes = Router::new()
        // Training
        .route("/api/retrain", post(training::retrain))
        .route("/api/training-status", get(training::latest_training_status))
        .route("/api/training-status/:id", get(training::training_status))
        .route("/api/training-status/:id/stop", post(training::stop_training))
        // Model
        .route("/api/model-info", get(models::model_info))
        .route("/api/predict", post(models::predict))
        // Monitoring
        .route("/api/status", get(status::get_status))
        .route("/api/visualization", get(visualization::get_visualization));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_request,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime: f64,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        timestamp: Utc::now(),
        uptime: state.uptime(),
    })
}

/// Map a missing JSON field to a validation error
pub(crate) fn require<T>(value: Option<T>, message: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(message.to_string()))
}

/// Unwrap a JSON request body.
///
/// A request without a JSON content type carries no fields and reads as
/// `null`. Every other rejection becomes a validation error.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Null),
        Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
    }
}

/// A top-level field of `body`, `None` when absent or blank
pub(crate) fn field(body: &Value, key: &str) -> Option<Value> {
    body.get(key).filter(|value| !is_blank(value)).cloned()
}
