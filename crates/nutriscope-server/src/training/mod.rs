//! Training module for Nutriscope Server
//!
//! Tracks simulated retraining jobs and the background drivers that advance them.

pub mod driver;
pub mod job;
pub mod registry;

pub use driver::{DriverConfig, ProgressDriver};
pub use job::{DatasetDescriptor, FinalMetrics, Job, JobStatus};
pub use registry::JobRegistry;
