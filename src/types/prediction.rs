//! Prediction outcome data structures

use serde::{Deserialize, Serialize};

/// Binary outcome of thresholding the churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnLabel {
    Churn,
    NoChurn,
}

impl ChurnLabel {
    /// Apply the decision threshold; a probability equal to the threshold is churn.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            ChurnLabel::Churn
        } else {
            ChurnLabel::NoChurn
        }
    }

    /// Short label ("churn" / "no churn")
    pub fn as_str(self) -> &'static str {
        match self {
            ChurnLabel::Churn => "churn",
            ChurnLabel::NoChurn => "no churn",
        }
    }

    /// User-facing status string returned by the API
    pub fn status(self) -> &'static str {
        match self {
            ChurnLabel::Churn => "Churn (Likely to leave)",
            ChurnLabel::NoChurn => "No Churn (Likely to stay)",
        }
    }

    pub fn risk_level(self) -> RiskLevel {
        match self {
            ChurnLabel::Churn => RiskLevel::High,
            ChurnLabel::NoChurn => RiskLevel::Low,
        }
    }

    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            ChurnLabel::Churn => &[
                "Offer retention discount.",
                "Contact customer for feedback.",
                "Review pricing structure.",
            ],
            ChurnLabel::NoChurn => &[
                "Monitor satisfaction.",
                "Upsell relevant services.",
                "Reward loyalty.",
            ],
        }
    }
}

/// Risk tier reported to the caller.
///
/// `Medium` is part of the response contract but is never produced: tiers
/// follow the binary label only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Result of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Probability of the positive (churn) class, 0.0 - 1.0
    pub probability: f64,
    pub label: ChurnLabel,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl PredictionResult {
    pub fn new(probability: f64, threshold: f64) -> Self {
        let label = ChurnLabel::from_probability(probability, threshold);
        Self {
            probability,
            label,
            risk_level: label.risk_level(),
            recommendations: label
                .recommendations()
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}

/// Response body of `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_churn_status: String,
    pub probability_of_churn: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            predicted_churn_status: result.label.status().to_string(),
            probability_of_churn: result.probability,
            risk_level: result.risk_level,
            recommendations: result.recommendations,
        }
    }
}
