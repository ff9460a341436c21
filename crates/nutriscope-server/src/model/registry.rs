//! Model registry for Nutriscope
//!
//! Keeps the single live model record. Every completed retraining job replaces
//! its quality metrics and bumps the patch component of its version.

use crate::config::ModelConfig;
use crate::error::{ApiError, ApiResult};
use crate::training::job::FinalMetrics;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Precision reported by every simulated retraining
pub const RETRAINED_PRECISION: f64 = 0.935;
/// Recall reported by every simulated retraining
pub const RETRAINED_RECALL: f64 = 0.928;
/// F1 score reported by every simulated retraining
pub const RETRAINED_F1_SCORE: f64 = 0.932;

const INPUT_FEATURES: [&str; 8] = [
    "age",
    "weight",
    "height",
    "bmi",
    "muac",
    "region",
    "accessToCleanWater",
    "dietaryDiversity",
];

const OUTPUT_CLASSES: [&str; 3] = [
    "Normal",
    "Moderate Acute Malnutrition",
    "Severe Acute Malnutrition",
];

/// Dotted `major.minor.patch` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModelVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ModelVersion {
    /// The version that follows this one after a retraining
    pub fn next_patch(self) -> ApiResult<Self> {
        let patch = self
            .patch
            .checked_add(1)
            .ok_or_else(|| ApiError::Format(format!("patch component of {} overflowed", self)))?;

        Ok(Self { patch, ..self })
    }
}

impl FromStr for ModelVersion {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(ApiError::Format(format!(
                "version '{}' must have three dot-separated components",
                s
            )));
        }

        let component = |part: &str| {
            // u64::from_str accepts a leading '+', a version must not
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ApiError::Format(format!(
                    "version '{}' has a non-numeric component '{}'",
                    s, part
                )));
            }
            part.parse::<u64>()
                .map_err(|e| ApiError::Format(format!("version '{}': {}", s, e)))
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Metadata of the live model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub name: String,
    pub version: String,
    pub last_trained_at: DateTime<Utc>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub framework: String,
    pub input_features: Vec<String>,
    pub output_classes: Vec<String>,
}

impl ModelRecord {
    /// The record the service starts with before any retraining
    pub fn initial(config: &ModelConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            last_trained_at: Utc
                .with_ymd_and_hms(2023, 10, 15, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            accuracy: 0.932,
            precision: 0.915,
            recall: 0.908,
            f1_score: 0.912,
            framework: config.framework.clone(),
            input_features: INPUT_FEATURES.iter().map(|s| s.to_string()).collect(),
            output_classes: OUTPUT_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parsed form of `version`
    pub fn parsed_version(&self) -> ApiResult<ModelVersion> {
        self.version.parse()
    }
}

/// Registry holding exactly one live model record
pub struct ModelRegistry {
    record: RwLock<ModelRecord>,
}

impl ModelRegistry {
    /// Create a registry from configuration
    pub fn new(config: &ModelConfig) -> ApiResult<Self> {
        Self::from_record(ModelRecord::initial(config))
    }

    /// Create a registry around an existing record
    pub fn from_record(record: ModelRecord) -> ApiResult<Self> {
        record.parsed_version()?;
        Ok(Self {
            record: RwLock::new(record),
        })
    }

    /// Snapshot of the live record
    pub async fn current(&self) -> ModelRecord {
        self.record.read().await.clone()
    }

    /// Apply the result of a completed retraining job.
    ///
    /// The new record is computed before anything is written, so a
    /// [`ApiError::Format`] leaves the live record untouched.
    pub async fn record_training_completion(
        &self,
        metrics: &FinalMetrics,
    ) -> ApiResult<ModelRecord> {
        let mut record = self.record.write().await;

        let previous = record.parsed_version()?;
        let next = previous.next_patch()?;

        record.version = next.to_string();
        record.last_trained_at = Utc::now();
        record.accuracy = metrics.accuracy;
        record.precision = RETRAINED_PRECISION;
        record.recall = RETRAINED_RECALL;
        record.f1_score = RETRAINED_F1_SCORE;

        tracing::info!(
            from = %previous,
            to = %next,
            accuracy = metrics.accuracy,
            "Model version bumped after retraining"
        );

        Ok(record.clone())
    }

    #[cfg(test)]
    pub(crate) async fn overwrite_version(&self, version: &str) {
        self.record.write().await.version = version.to_string();
    }
}
