//! Customer Churn Prediction Service Library
//!
//! Turns a raw telecom customer record into the feature vector a
//! pre-trained classifier expects, scores it, and serves the result
//! over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod feature_transformer;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use error::{PredictionError, ValidationErrors};
pub use feature_transformer::{FeatureTransformer, FeatureVector};
pub use models::{Classifier, ModelArtifacts};
pub use service::PredictionService;
pub use types::{CustomerRecord, PredictionResponse, PredictionResult};
