//! Nutriscope Server - monitoring backend for the malnutrition analysis model
//!
//! Runs simulated retraining jobs against a single model record, keeps request
//! telemetry for every HTTP call, and exposes both over a JSON API.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod training;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{ApiError, ApiResult};
