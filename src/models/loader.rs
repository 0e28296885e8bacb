//! Startup loading of the model artifact bundle

use crate::config::{ArtifactsConfig, ClassifierKind};
use crate::error::ArtifactError;
use crate::feature_transformer::FeatureTransformer;
use crate::models::classifier::{Classifier, LinearClassifier, OnnxClassifier};
use crate::preprocessing::{NumericScaler, OneHotEncoder};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

/// Immutable, process-lifetime artifacts: the feature transformer and the classifier.
pub struct ModelArtifacts {
    transformer: FeatureTransformer,
    classifier: Box<dyn Classifier>,
}

impl ModelArtifacts {
    /// Pair a transformer with a classifier, refusing combinations that
    /// cannot have been trained together.
    pub fn new(
        transformer: FeatureTransformer,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self, ArtifactError> {
        let feature_count = transformer.feature_count();

        if let Some(width) = classifier.input_width() {
            if width != feature_count {
                return Err(ArtifactError::Incompatible(format!(
                    "classifier {} expects {} features but the transformer produces {}",
                    classifier.name(),
                    width,
                    feature_count
                )));
            }
        }

        if let Some(names) = classifier.feature_names() {
            check_feature_names(names, &transformer, classifier.name())?;
        }

        Ok(Self {
            transformer,
            classifier,
        })
    }

    /// Load every artifact named in the configuration.
    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        let encoder: OneHotEncoder = read_json_artifact(config.encoder_path())?;
        let scaler: NumericScaler = read_json_artifact(config.scaler_path())?;
        let transformer = FeatureTransformer::new(encoder, scaler)?;

        info!(
            encoder_columns = transformer.encoder().output_width(),
            scaler_columns = transformer.scaler().feature_names_in().len(),
            model_features = transformer.feature_count(),
            "Preprocessing artifacts loaded"
        );

        if let Some(path) = config.feature_names_path() {
            let names: Vec<String> = read_json_artifact(&path)?;
            check_feature_names(&names, &transformer, &path.display().to_string())?;
        }

        let classifier: Box<dyn Classifier> = match config.classifier {
            ClassifierKind::Onnx => Box::new(OnnxClassifier::load(
                config.model_path(),
                config.onnx_threads,
            )?),
            ClassifierKind::Linear => {
                let model: LinearClassifier = read_json_artifact(config.model_path())?;
                model.validate()?;
                Box::new(model)
            }
        };

        let artifacts = Self::new(transformer, classifier)?;
        info!(
            classifier = %artifacts.classifier.name(),
            model_features = artifacts.feature_count(),
            "Model artifacts ready"
        );
        Ok(artifacts)
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Length of `MODEL_FEATURES`
    pub fn feature_count(&self) -> usize {
        self.transformer.feature_count()
    }
}

fn check_feature_names(
    expected: &[String],
    transformer: &FeatureTransformer,
    source: &str,
) -> Result<(), ArtifactError> {
    let actual = transformer.schema().names();
    if expected == actual {
        return Ok(());
    }

    let first_difference = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .unwrap_or_else(|| expected.len().min(actual.len()));
    Err(ArtifactError::Incompatible(format!(
        "{source} lists {} features but the transformer produces {}; first difference at column {first_difference}",
        expected.len(),
        actual.len()
    )))
}

/// Read and deserialize one JSON artifact.
pub fn read_json_artifact<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ArtifactError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
