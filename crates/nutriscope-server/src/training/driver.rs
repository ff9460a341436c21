//! Progress driver for Nutriscope
//!
//! One background task per job. Each tick takes the job table's write lock,
//! moves the job forward and, on the last tick, applies the retraining result
//! to the model registry inside the same critical section.

use crate::config::TrainingConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::ModelRegistry;
use crate::training::job::{FinalMetrics, Job, Tick};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub(crate) type JobTable = Arc<RwLock<HashMap<String, Job>>>;
pub(crate) type DriverTable = Arc<RwLock<HashMap<String, DriverHandle>>>;

/// Tick schedule of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub tick_interval: Duration,
    pub step: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            step: 5,
        }
    }
}

impl From<&TrainingConfig> for DriverConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            step: config.progress_step,
        }
    }
}

/// Command to control a running driver
#[derive(Debug)]
pub enum DriverCommand {
    Stop,
}

/// Result of a single driver tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Progressed(u8),
    Completed,
    /// The job was already terminal, nothing changed
    Halted,
}

/// Handle kept by the registry for every live driver
#[derive(Debug)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Ask the driver to exit after its current tick
    pub fn stop(&self) {
        // Full means a stop is already queued, closed means the driver exited
        let _ = self.commands.try_send(DriverCommand::Stop);
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Background process advancing one job
pub struct ProgressDriver {
    job_id: String,
    jobs: JobTable,
    models: Arc<ModelRegistry>,
    config: DriverConfig,
}

impl ProgressDriver {
    pub(crate) fn new(
        job_id: String,
        jobs: JobTable,
        models: Arc<ModelRegistry>,
        config: DriverConfig,
    ) -> Self {
        Self {
            job_id,
            jobs,
            models,
            config,
        }
    }

    /// Spawn the driver and register its handle.
    ///
    /// The driver table stays locked until the handle is inserted, so the
    /// task's own cleanup can never run before registration.
    pub(crate) async fn start(self, drivers: &DriverTable) -> ApiResult<()> {
        let mut table = drivers.write().await;

        if let Some(existing) = table.get(&self.job_id) {
            if !existing.is_finished() {
                return Err(ApiError::Validation(format!(
                    "job {} already has an active driver",
                    self.job_id
                )));
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<DriverCommand>(4);
        let job_id = self.job_id.clone();
        let task = tokio::spawn(self.supervise(cmd_rx, drivers.clone()));

        table.insert(
            job_id,
            DriverHandle {
                commands: cmd_tx,
                task,
            },
        );

        Ok(())
    }

    async fn supervise(self, mut cmd_rx: mpsc::Receiver<DriverCommand>, drivers: DriverTable) {
        let outcome = AssertUnwindSafe(self.run(&mut cmd_rx)).catch_unwind().await;

        if outcome.is_err() {
            tracing::error!(job_id = %self.job_id, "Progress driver panicked");
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&self.job_id) {
                // The job may have reached a terminal state before the panic
                let _ = job.fail("progress driver terminated unexpectedly");
            }
        }

        drivers.write().await.remove(&self.job_id);
    }

    async fn run(&self, cmd_rx: &mut mpsc::Receiver<DriverCommand>) {
        let period = self.config.tick_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            job_id = %self.job_id,
            interval_ms = period.as_millis() as u64,
            step = self.config.step,
            "Progress driver started"
        );

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(DriverCommand::Stop) | None => {
                            tracing::info!(job_id = %self.job_id, "Progress driver stopped");
                            return;
                        }
                    }
                }
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(TickOutcome::Progressed(_)) => {}
                        Ok(TickOutcome::Completed) | Ok(TickOutcome::Halted) => return,
                        Err(e) => {
                            tracing::error!(job_id = %self.job_id, error = %e, "Progress driver aborted");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Run one tick against the job table
    pub async fn tick(&self) -> ApiResult<TickOutcome> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&self.job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Training job {} not found", self.job_id)))?;

        match job.advance(self.config.step) {
            Tick::Progressed(progress) => {
                tracing::debug!(job_id = %self.job_id, progress, "Training progress");
                Ok(TickOutcome::Progressed(progress))
            }
            Tick::Ignored => Ok(TickOutcome::Halted),
            Tick::Completing => {
                let metrics = FinalMetrics::retrained();

                match self.models.record_training_completion(&metrics).await {
                    Ok(record) => {
                        job.complete(metrics)?;
                        tracing::info!(
                            job_id = %self.job_id,
                            model_version = %record.version,
                            accuracy = metrics.accuracy,
                            loss = metrics.loss,
                            "Training completed"
                        );
                        Ok(TickOutcome::Completed)
                    }
                    Err(e) => {
                        tracing::error!(job_id = %self.job_id, error = %e, "Failed to record training completion");
                        job.fail(e.to_string())?;
                        Err(e)
                    }
                }
            }
        }
    }
}
