//! Job registry for Nutriscope
//!
//! Stores every retraining job created during the process lifetime and owns
//! the handles of their progress drivers.

use crate::error::{ApiError, ApiResult};
use crate::model::{ModelRecord, ModelRegistry};
use crate::training::driver::{DriverConfig, DriverTable, JobTable, ProgressDriver};
use crate::training::job::{DatasetDescriptor, Job};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Job counts reported next to the model record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCounts {
    pub active: usize,
    pub total: usize,
}

/// Registry of retraining jobs
pub struct JobRegistry {
    jobs: JobTable,
    drivers: DriverTable,
    models: Arc<ModelRegistry>,
    config: DriverConfig,
    sequence: AtomicU64,
}

impl JobRegistry {
    /// Create an empty registry whose jobs report to `models`
    pub fn new(models: Arc<ModelRegistry>, config: DriverConfig) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            drivers: Arc::new(RwLock::new(HashMap::new())),
            models,
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a job and start its driver. Returns without waiting for any tick.
    pub async fn create(&self, dataset: Option<DatasetDescriptor>) -> ApiResult<String> {
        let dataset = dataset.ok_or_else(|| {
            ApiError::Validation("Missing dataset for retraining".to_string())
        })?;

        let id = Uuid::new_v4().to_string();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let job = Job::new(id.clone(), dataset, sequence);

        tracing::info!(
            job_id = %id,
            dataset = %job.dataset.name,
            "Retraining job created"
        );

        self.jobs.write().await.insert(id.clone(), job);

        let driver = ProgressDriver::new(
            id.clone(),
            self.jobs.clone(),
            self.models.clone(),
            self.config,
        );
        if let Err(e) = driver.start(&self.drivers).await {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&id) {
                let _ = job.fail(e.to_string());
            }
            return Err(e);
        }

        Ok(id)
    }

    /// Snapshot of a job
    pub async fn get(&self, id: &str) -> ApiResult<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Training job not found".to_string()))
    }

    /// Id of the job with the latest start time
    pub async fn most_recent(&self) -> Option<String> {
        self.jobs
            .read()
            .await
            .values()
            .max_by_key(|job| (job.start_time, job.sequence))
            .map(|job| job.id.clone())
    }

    /// Cancel a job's driver and freeze the job as `Stopped`
    pub async fn stop(&self, id: &str) -> ApiResult<Job> {
        let job = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| ApiError::NotFound("Training job not found".to_string()))?;
            job.stop()?;
            job.clone()
        };

        if let Some(handle) = self.drivers.read().await.get(id) {
            handle.stop();
        }

        tracing::info!(job_id = %id, progress = job.progress, "Retraining job stopped");
        Ok(job)
    }

    /// All jobs in creation order
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.sequence);
        jobs
    }

    pub async fn counts(&self) -> JobCounts {
        Self::count(&*self.jobs.read().await)
    }

    /// Job counts and the model record, read under one job-table lock.
    ///
    /// Completions hold the job-table write lock while bumping the model, so
    /// the pair is always consistent.
    pub async fn counts_with_model(&self) -> (JobCounts, ModelRecord) {
        let jobs = self.jobs.read().await;
        let model = self.models.current().await;
        (Self::count(&jobs), model)
    }

    fn count(jobs: &HashMap<String, Job>) -> JobCounts {
        JobCounts {
            active: jobs.values().filter(|job| !job.status.is_terminal()).count(),
            total: jobs.len(),
        }
    }

    /// Whether a driver task is still registered for the job
    pub async fn is_driving(&self, id: &str) -> bool {
        self.drivers
            .read()
            .await
            .get(id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Abort every driver. Jobs keep their last state.
    pub async fn shutdown(&self) {
        let mut drivers = self.drivers.write().await;
        for (id, handle) in drivers.drain() {
            tracing::debug!(job_id = %id, "Aborting progress driver");
            handle.abort();
        }
    }
}
