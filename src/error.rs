//! Error taxonomy for the churn prediction service.
//!
//! Client faults (`ValidationErrors`) are kept apart from server faults
//! (`TransformError`, `InferenceError`) so the API layer can map each to
//! its own status code without inspecting message strings.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as it appears in the request body; empty for body-level errors
    pub field: String,
    /// Human readable reason
    pub message: String,
    /// Short machine-readable category (`missing`, `literal_error`, ...)
    pub kind: &'static str,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }
}

/// All field-level problems found in one request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single body-level error (malformed JSON, wrong top-level type).
    pub fn body(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new("", kind, message)],
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether `field` was among the rejected fields.
    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                if e.field.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.field, e.message)
                }
            })
            .collect();
        write!(f, "invalid customer record ({})", fields.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Failure while loading or cross-checking model artifacts at startup.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ONNX Runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("incompatible artifacts: {0}")]
    Incompatible(String),
}

/// Failure while turning a validated record into a feature vector.
#[derive(Error, Debug, PartialEq)]
pub enum TransformError {
    #[error("{stage} expected {expected} input columns, got {actual}")]
    InputWidth {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown category {value:?} for feature {feature}")]
    UnknownCategory { feature: String, value: String },

    #[error("column {0} is not part of the model feature schema")]
    UnexpectedColumn(String),

    #[error("non-finite value produced for column {0}")]
    NonFinite(String),
}

/// Failure inside the classifier call.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("classifier expects {expected} features, got {actual}")]
    Width { expected: usize, actual: usize },

    #[error("ONNX Runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("no positive-class probability in output of model {0}")]
    MissingProbability(String),

    #[error("classifier returned invalid probability {0}")]
    InvalidProbability(f64),

    #[error("classifier session lock poisoned")]
    Poisoned,
}

/// Everything that can stop a single prediction request.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("feature transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl PredictionError {
    /// Whether the caller, rather than the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictionError::Validation(_))
    }
}
