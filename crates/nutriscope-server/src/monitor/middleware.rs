//! Request telemetry middleware
//!
//! Times every request passing through the router and feeds exactly one
//! [`RequestEvent`] per completed response to the aggregator.

use crate::monitor::metrics::{MetricsAggregator, RequestEvent};
use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::time::Instant;

/// Record the method, route, status and latency of a request
pub async fn track_request(
    State(metrics): State<Arc<MetricsAggregator>>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = endpoint_key(request.method(), request.extensions().get::<MatchedPath>());

    let started = Instant::now();
    let response = next.run(request).await;
    let finished = Instant::now();

    metrics
        .ingest(RequestEvent {
            endpoint,
            status_code: response.status().as_u16(),
            duration_ms: finished.duration_since(started).as_secs_f64() * 1000.0,
            timestamp: finished,
        })
        .await;

    response
}

/// Key under which a request is aggregated.
///
/// Parameterised routes are grouped under their template, e.g.
/// `/api/training-status/:id`. Requests no route matched share one key.
fn endpoint_key(method: &Method, matched: Option<&MatchedPath>) -> String {
    match matched {
        Some(path) => format!("{} {}", method, path.as_str()),
        None => format!("{} <unmatched>", method),
    }
}
