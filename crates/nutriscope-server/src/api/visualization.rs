//! Visualization data for the dashboard charts
//!
//! Serves fixed survey aggregates. Unknown chart types get an error body with
//! a 200 status, which the dashboard renders as an empty chart.

use crate::api::{require, AppState};
use crate::error::ApiResult;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct VisualizationQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionalRow {
    pub region: &'static str,
    pub stunting: u32,
    pub wasting: u32,
    pub underweight: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyRow {
    pub month: &'static str,
    pub cases: u32,
    pub interventions: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgeBucket {
    pub name: &'static str,
    pub value: u32,
}

/// Chart data tagged by its type
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Visualization {
    Regional(Vec<RegionalRow>),
    TimeSeries(Vec<MonthlyRow>),
    AgeDistribution(Vec<AgeBucket>),
}

#[derive(Debug, Serialize)]
struct UnknownVisualization {
    error: &'static str,
}

impl Visualization {
    /// Fixture for a chart type, `None` when the type is unknown
    pub fn for_kind(kind: &str) -> Option<Self> {
        match kind {
            "regional" => Some(Self::regional()),
            "timeSeries" => Some(Self::time_series()),
            "ageDistribution" => Some(Self::age_distribution()),
            _ => None,
        }
    }

    fn regional() -> Self {
        let row = |region, stunting, wasting, underweight| RegionalRow {
            region,
            stunting,
            wasting,
            underweight,
        };
        Self::Regional(vec![
            row("North", 32, 14, 24),
            row("South", 24, 8, 18),
            row("East", 28, 12, 22),
            row("West", 18, 6, 14),
            row("Central", 26, 10, 20),
        ])
    }

    fn time_series() -> Self {
        let row = |month, cases, interventions| MonthlyRow {
            month,
            cases,
            interventions,
        };
        Self::TimeSeries(vec![
            row("Jan", 420, 380),
            row("Feb", 380, 350),
            row("Mar", 400, 390),
            row("Apr", 350, 330),
            row("May", 320, 310),
            row("Jun", 300, 290),
        ])
    }

    fn age_distribution() -> Self {
        let bucket = |name, value| AgeBucket { name, value };
        Self::AgeDistribution(vec![
            bucket("0-6 months", 25),
            bucket("7-12 months", 30),
            bucket("1-2 years", 20),
            bucket("2-5 years", 25),
        ])
    }
}

/// Chart data for `?type=`
pub async fn get_visualization(
    State(state): State<AppState>,
    Query(query): Query<VisualizationQuery>,
) -> ApiResult<Response> {
    let kind = require(
        query.kind.filter(|kind| !kind.is_empty()),
        "Missing visualization type",
    )?;

    let latency = Duration::from_millis(state.config.simulation.visualization_latency_ms);
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    let response = match Visualization::for_kind(&kind) {
        Some(visualization) => Json(visualization).into_response(),
        None => {
            tracing::debug!(kind = %kind, "Unknown visualization type requested");
            Json(UnknownVisualization {
                error: "Unknown visualization type",
            })
            .into_response()
        }
    };

    Ok(response)
}
