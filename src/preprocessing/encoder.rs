//! Pre-fitted one-hot encoder for the categorical customer fields

use crate::error::{ArtifactError, TransformError};
use serde::{Deserialize, Serialize};

/// What to do with a level the encoder was not fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Emit all zeros for the feature's columns
    #[default]
    Ignore,
    /// Fail the transform
    Error,
}

/// One-hot encoder exported from the training pipeline.
///
/// Output columns are laid out feature by feature, level by level, named
/// `<feature>_<level>`. A per-feature `drop` index removes that level's
/// column; a record holding the dropped level encodes as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    feature_names_in: Vec<String>,
    categories: Vec<Vec<String>>,
    #[serde(default)]
    drop: Option<Vec<Option<usize>>>,
    #[serde(default)]
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    /// Build an encoder without dropped levels.
    pub fn new(
        feature_names_in: Vec<String>,
        categories: Vec<Vec<String>>,
        handle_unknown: HandleUnknown,
    ) -> Result<Self, ArtifactError> {
        let encoder = Self {
            feature_names_in,
            categories,
            drop: None,
            handle_unknown,
        };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Drop one level per feature (`None` keeps all levels of that feature).
    pub fn with_drop(mut self, drop: Vec<Option<usize>>) -> Result<Self, ArtifactError> {
        self.drop = Some(drop);
        self.validate()?;
        Ok(self)
    }

    /// Check internal consistency of the fitted parameters.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.feature_names_in.len() != self.categories.len() {
            return Err(ArtifactError::Incompatible(format!(
                "encoder has {} input features but {} category lists",
                self.feature_names_in.len(),
                self.categories.len()
            )));
        }

        for (feature, levels) in self.feature_names_in.iter().zip(&self.categories) {
            if levels.is_empty() {
                return Err(ArtifactError::Incompatible(format!(
                    "encoder feature {feature} has no categories"
                )));
            }
            for (i, level) in levels.iter().enumerate() {
                if levels[..i].contains(level) {
                    return Err(ArtifactError::Incompatible(format!(
                        "encoder feature {feature} lists category {level:?} twice"
                    )));
                }
            }
        }

        if let Some(drop) = &self.drop {
            if drop.len() != self.categories.len() {
                return Err(ArtifactError::Incompatible(format!(
                    "encoder drop list has {} entries for {} features",
                    drop.len(),
                    self.categories.len()
                )));
            }
            for ((feature, levels), dropped) in self
                .feature_names_in
                .iter()
                .zip(&self.categories)
                .zip(drop)
            {
                if let Some(index) = dropped {
                    if *index >= levels.len() {
                        return Err(ArtifactError::Incompatible(format!(
                            "encoder drop index {index} out of range for feature {feature}"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn feature_names_in(&self) -> &[String] {
        &self.feature_names_in
    }

    pub fn handle_unknown(&self) -> HandleUnknown {
        self.handle_unknown
    }

    fn dropped(&self, feature: usize) -> Option<usize> {
        self.drop
            .as_ref()
            .and_then(|drop| drop.get(feature).copied().flatten())
    }

    /// Generated output column names, in output order.
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.output_width());
        for (i, (feature, levels)) in self
            .feature_names_in
            .iter()
            .zip(&self.categories)
            .enumerate()
        {
            for (j, level) in levels.iter().enumerate() {
                if self.dropped(i) != Some(j) {
                    names.push(format!("{feature}_{level}"));
                }
            }
        }
        names
    }

    /// Number of output columns.
    pub fn output_width(&self) -> usize {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, levels)| levels.len() - usize::from(self.dropped(i).is_some()))
            .sum()
    }

    /// Encode one row of raw category values, given in `feature_names_in` order.
    pub fn transform(&self, values: &[&str]) -> Result<Vec<f32>, TransformError> {
        if values.len() != self.feature_names_in.len() {
            return Err(TransformError::InputWidth {
                stage: "encoder",
                expected: self.feature_names_in.len(),
                actual: values.len(),
            });
        }

        let mut encoded = Vec::with_capacity(self.output_width());
        for (i, (levels, value)) in self.categories.iter().zip(values).enumerate() {
            let hit = levels.iter().position(|level| level == value);
            if hit.is_none() && self.handle_unknown == HandleUnknown::Error {
                return Err(TransformError::UnknownCategory {
                    feature: self.feature_names_in[i].clone(),
                    value: value.to_string(),
                });
            }

            let dropped = self.dropped(i);
            for j in 0..levels.len() {
                if dropped == Some(j) {
                    continue;
                }
                encoded.push(if hit == Some(j) { 1.0 } else { 0.0 });
            }
        }

        Ok(encoded)
    }
}
