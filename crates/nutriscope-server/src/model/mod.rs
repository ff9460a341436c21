//! Model module for Nutriscope Server
//!
//! Holds the live model record and the mock classifier behind `predict`.

pub mod prediction;
pub mod registry;

pub use registry::{ModelRecord, ModelRegistry, ModelVersion};
