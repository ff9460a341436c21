//! Retraining job records
//!
//! A [`Job`] only changes through the methods below, each of which keeps the
//! progress and status invariants intact.

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Progress value at which a job completes
pub const PROGRESS_COMPLETE: u8 = 100;

/// Retraining job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Training,
    Completed,
    /// Driver was cancelled before completion
    Stopped,
    /// Driver faulted; see `Job::error`
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Stopped | JobStatus::Failed
        )
    }
}

/// `null`, `false`, `0` and `""`: values a client sends for "not provided"
pub(crate) fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => false,
    }
}

fn default_records() -> serde_json::Value {
    serde_json::Value::String("Unknown".to_string())
}

fn records_or_unknown<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let records = serde_json::Value::deserialize(deserializer)?;
    Ok(if is_blank(&records) {
        default_records()
    } else {
        records
    })
}

/// Dataset a job retrains on. Opaque to the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: serde_json::Value,
    #[serde(default = "default_records", deserialize_with = "records_or_unknown")]
    pub records: serde_json::Value,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        size: impl Into<serde_json::Value>,
        records: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            size: size.into(),
            records: records.into(),
        }
    }
}

/// Metrics stamped on a job when it completes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FinalMetrics {
    pub accuracy: f64,
    pub loss: f64,
}

impl FinalMetrics {
    /// Terminal values of the simulated retraining
    pub fn retrained() -> Self {
        Self {
            accuracy: 0.941,
            loss: 0.082,
        }
    }
}

/// Loss reported at a given progress
pub fn loss_at(progress: u8) -> f64 {
    (1.0 - progress as f64 / 100.0) * 0.5
}

/// Accuracy reported at a given progress
pub fn accuracy_at(progress: u8) -> f64 {
    0.8 + (progress as f64 / 100.0) * 0.15
}

/// Epoch reported at a given progress
pub fn epoch_at(progress: u8) -> u32 {
    progress as u32 / 2
}

/// What a tick did to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Progress moved to the contained value
    Progressed(u8),
    /// The next step reaches 100; the caller must finish the job
    Completing,
    /// The job is terminal and was left alone
    Ignored,
}

/// A retraining job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub dataset: DatasetDescriptor,
    pub current_epoch: u32,
    pub current_loss: f64,
    pub current_accuracy: f64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_metrics: Option<FinalMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation order, breaks ties between equal start times
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl Job {
    pub fn new(id: String, dataset: DatasetDescriptor, sequence: u64) -> Self {
        Self {
            id,
            status: JobStatus::Created,
            progress: 0,
            dataset,
            current_epoch: epoch_at(0),
            current_loss: loss_at(0),
            current_accuracy: accuracy_at(0),
            start_time: Utc::now(),
            updated_at: None,
            completed_at: None,
            final_metrics: None,
            error: None,
            sequence,
        }
    }

    fn set_progress(&mut self, progress: u8) {
        self.progress = progress;
        self.current_epoch = epoch_at(progress);
        self.current_loss = loss_at(progress);
        self.current_accuracy = accuracy_at(progress);
        self.updated_at = Some(Utc::now());
    }

    /// Advance by `step` percentage points unless that would finish the job
    pub fn advance(&mut self, step: u8) -> Tick {
        if self.status.is_terminal() {
            return Tick::Ignored;
        }

        let next = self.progress.saturating_add(step.max(1));
        if next >= PROGRESS_COMPLETE {
            return Tick::Completing;
        }

        self.status = JobStatus::Training;
        self.set_progress(next);
        Tick::Progressed(next)
    }

    /// Clamp to 100 and enter `Completed`. Only valid once.
    pub fn complete(&mut self, metrics: FinalMetrics) -> ApiResult<()> {
        self.ensure_active("complete")?;

        self.set_progress(PROGRESS_COMPLETE);
        self.status = JobStatus::Completed;
        self.completed_at = self.updated_at;
        self.final_metrics = Some(metrics);
        Ok(())
    }

    /// Freeze the job at its current progress
    pub fn stop(&mut self) -> ApiResult<()> {
        self.ensure_active("stop")?;

        self.status = JobStatus::Stopped;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the job as failed, keeping its last progress
    pub fn fail(&mut self, reason: impl Into<String>) -> ApiResult<()> {
        self.ensure_active("fail")?;

        self.status = JobStatus::Failed;
        self.error = Some(reason.into());
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> ApiResult<()> {
        if self.status.is_terminal() {
            return Err(ApiError::Validation(format!(
                "cannot {} job {}: already {:?}",
                action, self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            "job-1".to_string(),
            DatasetDescriptor::new("A", "10MB", 1000),
            0,
        )
    }

    #[test]
    fn test_new_job() {
        let job = job();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.progress, 0);
        assert_eq!(job.current_loss, 0.5);
        assert_eq!(job.current_accuracy, 0.8);
        assert!(job.completed_at.is_none());
        assert!(job.final_metrics.is_none());
    }

    #[test]
    fn test_derived_metrics() {
        assert_eq!(epoch_at(45), 22);
        assert!((loss_at(40) - 0.3).abs() < 1e-12);
        assert!((accuracy_at(40) - 0.86).abs() < 1e-12);
        assert_eq!(loss_at(100), 0.0);
        assert!((accuracy_at(100) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_advance_until_completing() {
        let mut job = job();
        let mut previous = job.progress;

        for _ in 0..19 {
            match job.advance(5) {
                Tick::Progressed(p) => {
                    assert_eq!(p, previous + 5);
                    assert_eq!(job.status, JobStatus::Training);
                    previous = p;
                }
                other => panic!("unexpected tick {:?}", other),
            }
        }

        assert_eq!(job.progress, 95);
        assert_eq!(job.advance(5), Tick::Completing);
        // The completing tick does not touch the job
        assert_eq!(job.progress, 95);
        assert_eq!(job.status, JobStatus::Training);

        job.complete(FinalMetrics::retrained()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.current_loss, 0.0);
        assert_eq!(job.completed_at, job.updated_at);
        assert_eq!(job.final_metrics, Some(FinalMetrics::retrained()));
    }

    #[test]
    fn test_completion_happens_once() {
        let mut job = job();
        job.complete(FinalMetrics::retrained()).unwrap();
        let snapshot = job.clone();

        assert!(job
            .complete(FinalMetrics { accuracy: 0.1, loss: 0.9 })
            .is_err());
        assert_eq!(job.advance(5), Tick::Ignored);
        assert!(job.stop().is_err());
        assert!(job.fail("late").is_err());
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_step_that_does_not_divide_100() {
        let mut job = job();
        for _ in 0..3 {
            job.advance(30);
        }
        assert_eq!(job.progress, 90);
        assert_eq!(job.advance(30), Tick::Completing);
    }

    #[test]
    fn test_stop_and_fail() {
        let mut job = job();
        job.advance(5);
        job.stop().unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert_eq!(job.progress, 5);
        assert!(job.completed_at.is_none());

        let mut other = Job::new("job-2".into(), DatasetDescriptor::new("B", 1, 1), 1);
        other.fail("driver panicked").unwrap();
        assert_eq!(other.status, JobStatus::Failed);
        assert_eq!(other.error.as_deref(), Some("driver panicked"));
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(job()).unwrap();
        assert_eq!(value["status"], "created");
        assert_eq!(value["dataset"]["records"], 1000);
        assert!(value.get("currentLoss").is_some());
        assert!(value.get("startTime").is_some());
        assert!(value.get("completedAt").is_none());
        assert!(value.get("sequence").is_none());
    }

    #[test]
    fn test_dataset_records_default() {
        let dataset: DatasetDescriptor =
            serde_json::from_value(serde_json::json!({"name": "A", "size": "10MB"})).unwrap();
        assert_eq!(dataset.records, serde_json::json!("Unknown"));

        for blank in [serde_json::json!(null), serde_json::json!(0), serde_json::json!("")] {
            let dataset: DatasetDescriptor = serde_json::from_value(
                serde_json::json!({"name": "A", "size": "10MB", "records": blank}),
            )
            .unwrap();
            assert_eq!(dataset.records, serde_json::json!("Unknown"));
        }
    }

    #[test]
    fn test_is_blank() {
        for value in [
            serde_json::json!(null),
            serde_json::json!(false),
            serde_json::json!(0),
            serde_json::json!(0.0),
            serde_json::json!(""),
        ] {
            assert!(is_blank(&value), "{} should be blank", value);
        }
        for value in [
            serde_json::json!(true),
            serde_json::json!(12),
            serde_json::json!("A"),
            serde_json::json!([]),
            serde_json::json!({}),
        ] {
            assert!(!is_blank(&value), "{} should not be blank", value);
        }
    }
}
