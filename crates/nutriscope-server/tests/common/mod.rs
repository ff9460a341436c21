//! Common test utilities for integration tests

#![allow(dead_code)]

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const TEST_API_URL: &str = "http://localhost:5000";

/// Test HTTP client with common configuration
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// Make a GET request against the test server
pub async fn get(client: &Client, path: &str) -> Result<reqwest::Response, String> {
    client
        .get(format!("{}{}", TEST_API_URL, path))
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))
}

/// Make a JSON POST request against the test server
pub async fn post(client: &Client, path: &str, body: Value) -> Result<reqwest::Response, String> {
    client
        .post(format!("{}{}", TEST_API_URL, path))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))
}

/// Start a retraining job and return its id
pub async fn start_retraining(client: &Client, name: &str) -> Result<String, String> {
    let response = post(
        client,
        "/api/retrain",
        serde_json::json!({
            "dataset": { "name": name, "size": "10MB", "records": 1000 }
        }),
    )
    .await?;

    if !response.status().is_success() {
        return Err(format!("Retrain failed: {}", response.status()));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse response: {}", e))?;

    body.get("trainingId")
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| "No trainingId in response".to_string())
}

/// Check if test server is running
pub async fn is_server_running() -> bool {
    let client = test_client();
    client
        .get(format!("{}/health", TEST_API_URL))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}
