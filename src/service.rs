//! Prediction service: validate, transform, infer, classify.

use crate::error::{InferenceError, PredictionError};
use crate::models::ModelArtifacts;
use crate::types::{CustomerRecord, PredictionResult};
use serde_json::Value;
use tracing::debug;

/// Default decision threshold on the churn probability
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Stateless request-scoped prediction over immutable artifacts.
pub struct PredictionService {
    artifacts: ModelArtifacts,
    threshold: f64,
}

impl PredictionService {
    pub fn new(artifacts: ModelArtifacts, threshold: f64) -> Self {
        Self {
            artifacts,
            threshold,
        }
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Length of the model feature vector
    pub fn feature_count(&self) -> usize {
        self.artifacts.feature_count()
    }

    /// Validate a raw request body, then predict.
    ///
    /// Invalid bodies are rejected before the transformer or classifier run.
    pub fn predict_json(&self, body: &Value) -> Result<PredictionResult, PredictionError> {
        let record = CustomerRecord::from_json(body)?;
        self.predict(&record)
    }

    /// Score a validated customer record.
    pub fn predict(&self, record: &CustomerRecord) -> Result<PredictionResult, PredictionError> {
        let features = self.artifacts.transformer().transform(record)?;
        let classifier = self.artifacts.classifier();
        let probability = classifier.predict_proba(&features)?;

        if !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidProbability(probability).into());
        }

        let result = PredictionResult::new(probability, self.threshold);
        debug!(
            classifier = %classifier.name(),
            probability,
            label = result.label.as_str(),
            "Prediction complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        high_risk_record, low_risk_record, stub_artifacts, telco_artifacts, telco_transformer,
        FailingClassifier,
    };
    use crate::types::customer::tests::minimal_body;
    use crate::types::{ChurnLabel, RiskLevel};
    use std::sync::atomic::Ordering;

    fn service() -> PredictionService {
        PredictionService::new(telco_artifacts(), DEFAULT_THRESHOLD)
    }

    #[test]
    fn test_high_risk_customer() {
        let result = service().predict(&high_risk_record()).unwrap();

        assert!(result.probability > 0.7, "probability {}", result.probability);
        assert_eq!(result.label, ChurnLabel::Churn);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.recommendations.len(), 3);
        assert_eq!(result.recommendations[0], "Offer retention discount.");
    }

    #[test]
    fn test_low_risk_customer() {
        let result = service().predict(&low_risk_record()).unwrap();

        assert!(result.probability < 0.3, "probability {}", result.probability);
        assert_eq!(result.label, ChurnLabel::NoChurn);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.recommendations[0], "Monitor satisfaction.");
    }

    #[test]
    fn test_prediction_is_idempotent() {
        let service = service();
        let record = high_risk_record();
        let first = service.predict(&record).unwrap();
        let second = service.predict(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_probability_at_threshold_is_churn() {
        let (artifacts, _) = stub_artifacts(0.5);
        let service = PredictionService::new(artifacts, DEFAULT_THRESHOLD);

        let result = service.predict(&low_risk_record()).unwrap();
        assert_eq!(result.probability, 0.5);
        assert_eq!(result.label, ChurnLabel::Churn);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_invalid_input_never_reaches_classifier() {
        let (artifacts, calls) = stub_artifacts(0.9);
        let service = PredictionService::new(artifacts, DEFAULT_THRESHOLD);

        let mut body = minimal_body();
        body["SeniorCitizen"] = serde_json::json!(2);

        let err = service.predict_json(&body).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        service.predict_json(&minimal_body()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inference_failure_is_server_error() {
        let artifacts = ModelArtifacts::new(telco_transformer(), Box::new(FailingClassifier)).unwrap();
        let service = PredictionService::new(artifacts, DEFAULT_THRESHOLD);

        let err = service.predict(&high_risk_record()).unwrap_err();
        assert!(matches!(err, PredictionError::Inference(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let (artifacts, _) = stub_artifacts(1.2);
        let service = PredictionService::new(artifacts, DEFAULT_THRESHOLD);

        let err = service.predict(&high_risk_record()).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::Inference(InferenceError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_custom_threshold() {
        let (artifacts, _) = stub_artifacts(0.45);
        let service = PredictionService::new(artifacts, 0.4);
        assert_eq!(service.threshold(), 0.4);
        assert_eq!(
            service.predict(&low_risk_record()).unwrap().label,
            ChurnLabel::Churn
        );
    }
}
