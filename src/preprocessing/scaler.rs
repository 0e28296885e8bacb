//! Pre-fitted numeric scaler

use crate::error::{ArtifactError, TransformError};
use serde::{Deserialize, Serialize};

/// Numeric scaler exported from the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericScaler {
    /// `(x - mean) / scale`
    Standard {
        feature_names_in: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    /// `x * scale + min`
    MinMax {
        feature_names_in: Vec<String>,
        min: Vec<f64>,
        scale: Vec<f64>,
    },
}

impl NumericScaler {
    pub fn feature_names_in(&self) -> &[String] {
        match self {
            NumericScaler::Standard {
                feature_names_in, ..
            }
            | NumericScaler::MinMax {
                feature_names_in, ..
            } => feature_names_in,
        }
    }

    /// Check that every per-feature parameter list matches the feature count.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let width = self.feature_names_in().len();
        let (name, offsets, scale) = match self {
            NumericScaler::Standard { mean, scale, .. } => ("mean", mean, scale),
            NumericScaler::MinMax { min, scale, .. } => ("min", min, scale),
        };

        if offsets.len() != width || scale.len() != width {
            return Err(ArtifactError::Incompatible(format!(
                "scaler has {width} features but {} {name} and {} scale values",
                offsets.len(),
                scale.len()
            )));
        }
        if offsets.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err(ArtifactError::Incompatible(
                "scaler parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Scale one row given in `feature_names_in` order.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f32>, TransformError> {
        let width = self.feature_names_in().len();
        if values.len() != width {
            return Err(TransformError::InputWidth {
                stage: "scaler",
                expected: width,
                actual: values.len(),
            });
        }

        let scaled: Vec<f64> = match self {
            NumericScaler::Standard { mean, scale, .. } => values
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| {
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    (x - m) / s
                })
                .collect(),
            NumericScaler::MinMax { min, scale, .. } => values
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };

        scaled
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_finite() {
                    Ok(v as f32)
                } else {
                    Err(TransformError::NonFinite(self.feature_names_in()[i].clone()))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> NumericScaler {
        NumericScaler::Standard {
            feature_names_in: vec!["tenure".into(), "MonthlyCharges".into()],
            mean: vec![32.0, 65.0],
            scale: vec![24.0, 0.0],
        }
    }

    #[test]
    fn test_standard_scaling() {
        let scaled = standard().transform(&[56.0, 70.0]).unwrap();
        assert_eq!(scaled, vec![1.0, 5.0]);
    }

    #[test]
    fn test_min_max_scaling() {
        let scaler = NumericScaler::MinMax {
            feature_names_in: vec!["tenure".into()],
            min: vec![0.0],
            scale: vec![1.0 / 72.0],
        };
        let scaled = scaler.transform(&[36.0]).unwrap();
        assert!((scaled[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_width_mismatch() {
        assert!(matches!(
            standard().transform(&[1.0]),
            Err(TransformError::InputWidth { stage: "scaler", expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_validate_parameter_lengths() {
        let scaler = NumericScaler::Standard {
            feature_names_in: vec!["tenure".into(), "MonthlyCharges".into()],
            mean: vec![32.0],
            scale: vec![24.0, 30.0],
        };
        assert!(scaler.validate().is_err());
        assert!(standard().validate().is_ok());
    }

    #[test]
    fn test_deserialize_tagged_artifact() {
        let json = r#"{
            "kind": "standard",
            "feature_names_in": ["tenure"],
            "mean": [32.4],
            "scale": [24.6]
        }"#;
        let scaler: NumericScaler = serde_json::from_str(json).unwrap();
        assert!(matches!(scaler, NumericScaler::Standard { .. }));
        assert_eq!(scaler.feature_names_in(), ["tenure".to_string()]);
    }
}
