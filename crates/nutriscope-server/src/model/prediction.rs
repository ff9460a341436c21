//! Mock malnutrition classifier
//!
//! Returns a fixed classification regardless of input. The dashboard only needs
//! a stable shape to render.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A risk factor flagged by the classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub factor: String,
    pub severity: String,
}

/// Classification result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub predicted_class: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub risk_factors: Vec<RiskFactor>,
    pub recommendations: Vec<String>,
}

/// Classify a patient record
pub fn predict(data: &serde_json::Value) -> ApiResult<Prediction> {
    if data.is_null() {
        return Err(ApiError::Validation(
            "Missing data for prediction".to_string(),
        ));
    }

    let probabilities = BTreeMap::from([
        ("Normal".to_string(), 0.15),
        ("Moderate Acute Malnutrition".to_string(), 0.25),
        ("Severe Acute Malnutrition".to_string(), 0.6),
    ]);

    let risk = |factor: &str, severity: &str| RiskFactor {
        factor: factor.to_string(),
        severity: severity.to_string(),
    };

    Ok(Prediction {
        predicted_class: "Severe Acute Malnutrition".to_string(),
        confidence: 0.6,
        probabilities,
        risk_factors: vec![
            risk("Low MUAC", "High"),
            risk("Low Weight for Height", "High"),
            risk("Poor Dietary Diversity", "Medium"),
        ],
        recommendations: vec![
            "Immediate referral to nutrition program".to_string(),
            "Therapeutic food supplements".to_string(),
            "Regular follow-up visits".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixed_prediction() {
        let prediction = predict(&json!({"age": 2, "muac": 11.2})).unwrap();
        assert_eq!(prediction.predicted_class, "Severe Acute Malnutrition");
        assert_eq!(prediction.confidence, 0.6);
        assert_eq!(prediction.risk_factors.len(), 3);

        let total: f64 = prediction.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_null_input_rejected() {
        assert!(matches!(
            predict(&serde_json::Value::Null),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(predict(&json!({})).unwrap()).unwrap();
        assert!(value.get("predictedClass").is_some());
        assert!(value.get("riskFactors").is_some());
        assert_eq!(value["probabilities"]["Normal"], json!(0.15));
    }
}
