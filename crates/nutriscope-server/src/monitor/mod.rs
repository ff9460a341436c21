//! Monitor module for Nutriscope Server
//!
//! Request telemetry: counters, running latency averages and the trailing
//! requests-per-minute window.

pub mod metrics;
pub mod middleware;
pub mod window;

pub use metrics::{EndpointStats, MetricsAggregator, MetricsSnapshot, RequestEvent};
pub use window::SlidingWindow;
