//! Request metrics for Nutriscope
//!
//! Aggregates one event per completed HTTP request into process-lifetime
//! counters, running response-time means and a trailing request-rate window.

use crate::monitor::window::SlidingWindow;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// A completed request
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// `"METHOD PATH"`
    pub endpoint: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub timestamp: Instant,
}

impl RequestEvent {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

/// Per-endpoint statistics
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub count: u64,
    pub response_time_avg: f64,
    pub last_called: DateTime<Utc>,
}

/// Point-in-time view of the aggregator
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub response_time_avg: f64,
    pub requests_per_minute: usize,
    pub status_codes: BTreeMap<u16, u64>,
    #[serde(rename = "endpoints")]
    pub per_endpoint: BTreeMap<String, EndpointStats>,
    pub success_rate: f64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request: Option<DateTime<Utc>>,
    /// Seconds since the aggregator was created
    pub uptime: f64,
}

/// Incremental mean after the `n`-th observation
fn running_mean(avg: f64, n: u64, value: f64) -> f64 {
    (avg * (n - 1) as f64 + value) / n as f64
}

#[derive(Debug)]
struct AggregatorState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    response_time_avg: f64,
    endpoints: HashMap<String, EndpointStats>,
    status_codes: BTreeMap<u16, u64>,
    window: SlidingWindow,
    requests_per_minute: usize,
    last_request: Option<DateTime<Utc>>,
}

/// Request metrics collector
pub struct MetricsAggregator {
    state: RwLock<AggregatorState>,
    started_at: Instant,
    start_time: DateTime<Utc>,
}

impl MetricsAggregator {
    /// Create a collector with the given request-rate window
    pub fn new(window: Duration) -> Self {
        Self {
            state: RwLock::new(AggregatorState {
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                response_time_avg: 0.0,
                endpoints: HashMap::new(),
                status_codes: BTreeMap::new(),
                window: SlidingWindow::new(window),
                requests_per_minute: 0,
                last_request: None,
            }),
            started_at: Instant::now(),
            start_time: Utc::now(),
        }
    }

    /// Record a completed request
    pub async fn ingest(&self, event: RequestEvent) {
        let now = Utc::now();
        let mut state = self.state.write().await;

        state.window.record(event.timestamp);
        state.last_request = Some(now);

        state.total_requests += 1;
        if event.is_success() {
            state.successful_requests += 1;
        } else {
            state.failed_requests += 1;
        }

        let n = state.total_requests;
        state.response_time_avg = running_mean(state.response_time_avg, n, event.duration_ms);

        let endpoint = state
            .endpoints
            .entry(event.endpoint)
            .or_insert_with(|| EndpointStats {
                count: 0,
                response_time_avg: 0.0,
                last_called: now,
            });
        endpoint.count += 1;
        endpoint.response_time_avg =
            running_mean(endpoint.response_time_avg, endpoint.count, event.duration_ms);
        endpoint.last_called = now;

        *state.status_codes.entry(event.status_code).or_insert(0) += 1;
    }

    /// Evict expired window entries and refresh `requestsPerMinute`
    pub async fn maintain_window(&self, now: Instant) -> usize {
        let mut state = self.state.write().await;
        let remaining = state.window.evict_expired(now);
        state.requests_per_minute = remaining;
        tracing::trace!(requests_per_minute = remaining, "Request window maintained");
        remaining
    }

    /// Current metrics
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read().await;

        let success_rate = if state.total_requests == 0 {
            100.0
        } else {
            state.successful_requests as f64 / state.total_requests as f64 * 100.0
        };

        MetricsSnapshot {
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            response_time_avg: state.response_time_avg,
            requests_per_minute: state.requests_per_minute,
            status_codes: state.status_codes.clone(),
            per_endpoint: state
                .endpoints
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            success_rate,
            start_time: self.start_time,
            last_request: state.last_request,
            uptime: self.started_at.elapsed().as_secs_f64(),
        }
    }

    /// Start the recurring window maintenance task.
    ///
    /// A panic inside one pass is logged and the next pass runs on schedule.
    pub fn start_window_maintenance(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let tick = interval.tick().await;

                let pass = AssertUnwindSafe(self.maintain_window(tick)).catch_unwind().await;
                if pass.is_err() {
                    tracing::error!("Request window maintenance panicked, retrying next interval");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(endpoint: &str, status_code: u16, duration_ms: f64) -> RequestEvent {
        RequestEvent {
            endpoint: endpoint.to_string(),
            status_code,
            duration_ms,
            timestamp: Instant::now(),
        }
    }

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::new(Duration::from_secs(60))
    }

    #[test]
    fn test_running_mean() {
        let mut avg = 0.0;
        for (i, d) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            avg = running_mean(avg, i as u64 + 1, d);
        }
        assert_eq!(avg, 200.0);
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let snapshot = aggregator().snapshot().await;
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.success_rate, 100.0);
        assert_eq!(snapshot.response_time_avg, 0.0);
        assert_eq!(snapshot.requests_per_minute, 0);
        assert!(snapshot.last_request.is_none());
    }

    #[tokio::test]
    async fn test_success_and_failure_counts() {
        let metrics = aggregator();
        metrics.ingest(event("GET /api/status", 200, 10.0)).await;
        metrics.ingest(event("GET /api/status", 200, 10.0)).await;
        metrics.ingest(event("POST /api/retrain", 500, 10.0)).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!((snapshot.success_rate - 66.666_666).abs() < 1e-3);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&500), Some(&1));
    }

    #[tokio::test]
    async fn test_success_boundaries() {
        let metrics = aggregator();
        for code in [199, 200, 302, 399, 400, 404] {
            metrics.ingest(event("GET /", code, 1.0)).await;
        }

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.successful_requests, 3);
        assert_eq!(snapshot.failed_requests, 3);
        assert_eq!(snapshot.success_rate, 50.0);
    }

    #[tokio::test]
    async fn test_response_time_averages() {
        let metrics = aggregator();
        metrics.ingest(event("GET /a", 200, 100.0)).await;
        metrics.ingest(event("GET /b", 200, 200.0)).await;
        metrics.ingest(event("GET /a", 200, 300.0)).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.response_time_avg, 200.0);

        let a = &snapshot.per_endpoint["GET /a"];
        assert_eq!(a.count, 2);
        assert_eq!(a.response_time_avg, 200.0);

        let b = &snapshot.per_endpoint["GET /b"];
        assert_eq!(b.count, 1);
        assert_eq!(b.response_time_avg, 200.0);
    }

    #[tokio::test]
    async fn test_per_endpoint_average_is_independent() {
        let metrics = aggregator();
        metrics.ingest(event("GET /fast", 200, 10.0)).await;
        metrics.ingest(event("GET /slow", 200, 1000.0)).await;
        metrics.ingest(event("GET /fast", 200, 30.0)).await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.per_endpoint["GET /fast"].response_time_avg, 20.0);
        assert_eq!(snapshot.per_endpoint["GET /slow"].response_time_avg, 1000.0);
        assert_eq!(snapshot.response_time_avg, 1040.0 / 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires_after_a_minute() {
        let metrics = aggregator();
        for _ in 0..70 {
            metrics.ingest(event("GET /api/status", 200, 1.0)).await;
        }

        assert_eq!(metrics.maintain_window(Instant::now()).await, 70);
        assert_eq!(metrics.snapshot().await.requests_per_minute, 70);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(metrics.maintain_window(Instant::now()).await, 0);

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.requests_per_minute, 0);
        // Lifetime counters are unaffected by the window
        assert_eq!(snapshot.total_requests, 70);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_per_minute_only_changes_on_maintenance() {
        let metrics = aggregator();
        metrics.ingest(event("GET /", 200, 1.0)).await;
        assert_eq!(metrics.snapshot().await.requests_per_minute, 0);

        metrics.maintain_window(Instant::now()).await;
        assert_eq!(metrics.snapshot().await.requests_per_minute, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_maintenance() {
        let metrics = Arc::new(aggregator());
        let task = metrics.clone().start_window_maintenance(Duration::from_secs(5));

        for _ in 0..70 {
            metrics.ingest(event("GET /", 200, 1.0)).await;
        }

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(metrics.snapshot().await.requests_per_minute, 70);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(metrics.snapshot().await.requests_per_minute, 0);

        task.abort();
    }

    #[tokio::test]
    async fn test_concurrent_ingest_loses_nothing() {
        let metrics = Arc::new(aggregator());

        let handles: Vec<_> = (0..100u64)
            .map(|i| {
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    let code = if i % 4 == 0 { 500 } else { 200 };
                    metrics.ingest(event("GET /", code, i as f64)).await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.total_requests, 100);
        assert_eq!(snapshot.failed_requests, 25);
        assert_eq!(
            snapshot.total_requests,
            snapshot.successful_requests + snapshot.failed_requests
        );
        // Mean of 0..100
        assert!((snapshot.response_time_avg - 49.5).abs() < 1e-9);
        assert_eq!(snapshot.per_endpoint["GET /"].count, 100);
    }

    #[tokio::test]
    async fn test_wire_shape() {
        let metrics = aggregator();
        metrics.ingest(event("GET /api/status", 404, 3.0)).await;

        let value = serde_json::to_value(metrics.snapshot().await).unwrap();
        assert_eq!(value["totalRequests"], 1);
        assert_eq!(value["statusCodes"]["404"], 1);
        assert!(value["endpoints"]["GET /api/status"].get("lastCalled").is_some());
        assert!(value.get("successRate").is_some());
        assert!(value.get("uptime").is_some());
    }
}
