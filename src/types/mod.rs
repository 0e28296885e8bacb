//! Type definitions for the churn prediction service

pub mod customer;
pub mod prediction;

pub use customer::CustomerRecord;
pub use prediction::{ChurnLabel, PredictionResponse, PredictionResult, RiskLevel};
