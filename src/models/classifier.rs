//! Churn classifiers behind a common probability interface

use crate::error::{ArtifactError, InferenceError};
use crate::feature_transformer::FeatureVector;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, ValueType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// A trained binary classifier scoring one feature vector at a time.
///
/// Implementations are loaded once and shared read-only across requests.
pub trait Classifier: Send + Sync {
    /// Model name used in logs and errors
    fn name(&self) -> &str;

    /// Input width declared by the model artifact, if it declares one
    fn input_width(&self) -> Option<usize> {
        None
    }

    /// Feature names the model was trained on, if the artifact carries them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Probability mass of the positive (churn) class
    fn predict_proba(&self, features: &FeatureVector<'_>) -> Result<f64, InferenceError>;
}

/// Classifier exported to ONNX and run through ONNX Runtime.
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_width: Option<usize>,
}

impl OnnxClassifier {
    /// Load an ONNX model from file.
    pub fn load<P: AsRef<Path>>(path: P, intra_threads: usize) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        ort::init().commit()?;
        info!(model = %name, path = %path.display(), threads = intra_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(path)?;

        let input = session.inputs.first().ok_or_else(|| {
            ArtifactError::Incompatible(format!("model {name} declares no inputs"))
        })?;
        let input_name = input.name.clone();
        let input_width = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape
                .iter()
                .last()
                .copied()
                .filter(|dim| *dim > 0)
                .map(|dim| dim as usize),
            other => {
                return Err(ArtifactError::Incompatible(format!(
                    "model {name} input {input_name} is {other:?}, expected a float tensor"
                )))
            }
        };

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                ArtifactError::Incompatible(format!("model {name} declares no outputs"))
            })?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            input_width = ?input_width,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }

    /// Pull the positive-class probability out of the session outputs.
    ///
    /// Handles `[1, C]` probability tensors as well as the `seq(map(int64, float))`
    /// layout produced by gradient-boosting converters.
    fn extract_probability(&self, outputs: &SessionOutputs) -> Result<f64, InferenceError> {
        if let Some(output) = outputs.get(&self.output_name) {
            if let Some(prob) = self.probability_from_value(output)? {
                return Ok(prob);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") || name == self.output_name {
                continue;
            }
            if let Some(prob) = self.probability_from_value(&output)? {
                debug!(model = %self.name, output = %name, "Probability taken from fallback output");
                return Ok(prob);
            }
        }

        Err(InferenceError::MissingProbability(self.name.clone()))
    }

    fn probability_from_value(&self, output: &DynValue) -> Result<Option<f64>, InferenceError> {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return Ok(positive_class_from_tensor(&dims, data));
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            return self.probability_from_sequence_map(output).map(Some);
        }

        Ok(None)
    }

    /// `seq(map(int64, float))`: class id 1 is churn.
    fn probability_from_sequence_map(&self, output: &DynValue) -> Result<f64, InferenceError> {
        let allocator = Allocator::default();

        let sequence = output.downcast_ref::<DynSequenceValueType>()?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let first = maps
            .first()
            .ok_or_else(|| InferenceError::MissingProbability(self.name.clone()))?;
        let kv_pairs = first.try_extract_key_values::<i64, f32>()?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
            return Ok(f64::from(*prob));
        }
        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
            return Ok(1.0 - f64::from(*prob));
        }

        Err(InferenceError::MissingProbability(self.name.clone()))
    }
}

/// Positive-class probability from a `[C]` or `[1, C]` tensor.
fn positive_class_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [classes] | [1, classes] => *classes,
        _ => return None,
    };

    match classes {
        1 => data.first().map(|p| f64::from(*p)),
        c if c >= 2 => data.get(1).map(|p| f64::from(*p)),
        _ => None,
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict_proba(&self, features: &FeatureVector<'_>) -> Result<f64, InferenceError> {
        use ort::value::Tensor;

        if let Some(expected) = self.input_width {
            if expected != features.len() {
                return Err(InferenceError::Width {
                    expected,
                    actual: features.len(),
                });
            }
        }

        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.values().to_vec()))?;

        let mut session = self.session.lock().map_err(|_| InferenceError::Poisoned)?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        self.extract_probability(&outputs)
    }
}

/// Logistic-regression classifier exported as plain coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    #[serde(default = "default_linear_name")]
    name: String,
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

fn default_linear_name() -> String {
    "logistic_regression".to_string()
}

impl LinearClassifier {
    pub fn new(
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ArtifactError> {
        let classifier = Self {
            name: default_linear_name(),
            feature_names,
            coefficients,
            intercept,
        };
        classifier.validate()?;
        Ok(classifier)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.feature_names.len() != self.coefficients.len() {
            return Err(ArtifactError::Incompatible(format!(
                "linear model {} has {} feature names but {} coefficients",
                self.name,
                self.feature_names.len(),
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArtifactError::Incompatible(format!(
                "linear model {} has non-finite parameters",
                self.name
            )));
        }
        Ok(())
    }
}

impl Classifier for LinearClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict_proba(&self, features: &FeatureVector<'_>) -> Result<f64, InferenceError> {
        if features.len() != self.coefficients.len() {
            return Err(InferenceError::Width {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }

        let logit: f64 = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.values())
                .map(|(w, x)| w * f64::from(*x))
                .sum::<f64>();

        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_transformer::FeatureSchema;
    use crate::testing::onnx_fixture;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn test_linear_probability() {
        let schema = schema();
        let vector = FeatureVector::from_values(&schema, vec![1.0, 2.0]);
        let model = LinearClassifier::new(vec!["a".into(), "b".into()], vec![0.5, -0.25], 0.0)
            .unwrap();

        // logit = 0.5 - 0.5 = 0
        let prob = model.predict_proba(&vector).unwrap();
        assert!((prob - 0.5).abs() < 1e-12);
        assert_eq!(model.input_width(), Some(2));
    }

    #[test]
    fn test_linear_width_mismatch() {
        let schema = schema();
        let vector = FeatureVector::from_values(&schema, vec![1.0, 2.0]);
        let model = LinearClassifier::new(vec!["a".into()], vec![1.0], 0.0).unwrap();

        assert!(matches!(
            model.predict_proba(&vector),
            Err(InferenceError::Width { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_linear_rejects_bad_artifact() {
        assert!(LinearClassifier::new(vec!["a".into()], vec![], 0.0).is_err());
        assert!(LinearClassifier::new(vec!["a".into()], vec![f64::NAN], 0.0).is_err());
    }

    #[test]
    fn test_linear_deserialize() {
        let json = r#"{"feature_names": ["a"], "coefficients": [2.0], "intercept": -1.0}"#;
        let model: LinearClassifier = serde_json::from_str(json).unwrap();
        assert_eq!(model.name(), "logistic_regression");
        assert_eq!(model.feature_names().unwrap(), ["a".to_string()]);
    }

    fn write_model(dir: &Path, file: &str, zipmap: bool) -> std::path::PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, onnx_fixture::softmax_classifier(zipmap)).unwrap();
        path
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn test_onnx_tensor_output() {
        let dir = tempfile::tempdir().unwrap();
        let model = OnnxClassifier::load(write_model(dir.path(), "softmax.onnx", false), 1).unwrap();
        assert_eq!(model.name(), "softmax");
        assert_eq!(model.input_width(), Some(2));

        // softmax([0, ln 3]) = [0.25, 0.75]
        let schema = schema();
        let vector = FeatureVector::from_values(&schema, vec![0.0, 3.0_f32.ln()]);
        let prob = model.predict_proba(&vector).unwrap();
        assert!((prob - 0.75).abs() < 1e-5, "probability {prob}");
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn test_onnx_zipmap_output() {
        let dir = tempfile::tempdir().unwrap();
        let model = OnnxClassifier::load(write_model(dir.path(), "zipmap.onnx", true), 1).unwrap();
        assert_eq!(model.output_name, "output_probability");

        let schema = schema();
        let vector = FeatureVector::from_values(&schema, vec![3.0_f32.ln(), 0.0]);
        let prob = model.predict_proba(&vector).unwrap();
        assert!((prob - 0.25).abs() < 1e-5, "probability {prob}");
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn test_onnx_width_checked_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let model = OnnxClassifier::load(write_model(dir.path(), "softmax.onnx", false), 1).unwrap();

        let wide = FeatureSchema::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let vector = FeatureVector::from_values(&wide, vec![0.0; 3]);
        assert!(matches!(
            model.predict_proba(&vector),
            Err(InferenceError::Width { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_positive_class_from_tensor() {
        assert_eq!(positive_class_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(positive_class_from_tensor(&[2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(positive_class_from_tensor(&[1, 1], &[0.25]), Some(0.25));
        assert_eq!(positive_class_from_tensor(&[2, 2], &[0.1, 0.9, 0.2, 0.8]), None);
        assert_eq!(positive_class_from_tensor(&[1, 0], &[]), None);
    }
}
