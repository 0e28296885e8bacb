//! Shared fixtures for unit tests: Telco-style artifacts and stub classifiers.

use crate::error::InferenceError;
use crate::feature_transformer::{
    FeatureTransformer, FeatureVector, CATEGORICAL_FEATURES, NUMERICAL_FEATURES,
};
use crate::models::classifier::{Classifier, LinearClassifier};
use crate::models::loader::ModelArtifacts;
use crate::preprocessing::{HandleUnknown, NumericScaler, OneHotEncoder};
use crate::types::customer::{
    AddonService, Contract, CustomerRecord, InternetService, MultipleLines,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Encoder fitted on the Telco customer data (levels sorted as the fitter sorts them).
pub fn telco_encoder() -> OneHotEncoder {
    OneHotEncoder::new(
        strings(&CATEGORICAL_FEATURES),
        vec![
            strings(&["Female", "Male"]),
            strings(&["No", "Yes"]),
            strings(&["No", "Yes"]),
            strings(&["No", "Yes"]),
            strings(&["No", "No phone service", "Yes"]),
            strings(&["DSL", "Fiber optic", "No"]),
            strings(&["Month-to-month", "One year", "Two year"]),
            strings(&["No", "Yes"]),
            strings(&[
                "Bank transfer (automatic)",
                "Credit card (automatic)",
                "Electronic check",
                "Mailed check",
            ]),
        ],
        HandleUnknown::Ignore,
    )
    .unwrap()
}

/// Standard scaler with Telco-like column statistics.
pub fn telco_scaler() -> NumericScaler {
    NumericScaler::Standard {
        feature_names_in: strings(&NUMERICAL_FEATURES),
        mean: vec![0.16, 32.4, 64.8, 2283.3, 2.04, 0.41],
        scale: vec![0.37, 24.6, 30.1, 2266.8, 1.84, 0.49],
    }
}

pub fn telco_transformer() -> FeatureTransformer {
    FeatureTransformer::new(telco_encoder(), telco_scaler()).unwrap()
}

/// Logistic model with the usual churn drivers: short tenure, month-to-month
/// contracts, fiber internet and missing protection raise risk.
pub fn telco_classifier() -> LinearClassifier {
    let weights = [
        ("SeniorCitizen", 0.2),
        ("tenure", -0.8),
        ("MonthlyCharges", 0.4),
        ("TotalCharges", -0.2),
        ("Num_Addon_Services", -0.1),
        ("Has_Internet_No_Security", 0.4),
        ("InternetService_Fiber optic", 0.6),
        ("Contract_Month-to-month", 0.9),
        ("Contract_Two year", -1.0),
        ("PaymentMethod_Electronic check", 0.3),
    ];

    let names = telco_transformer().schema().names().to_vec();
    let coefficients = names
        .iter()
        .map(|name| {
            weights
                .iter()
                .find(|(feature, _)| *feature == name.as_str())
                .map(|(_, w)| *w)
                .unwrap_or(0.0)
        })
        .collect();

    LinearClassifier::new(names, coefficients, -1.0).unwrap()
}

pub fn telco_artifacts() -> ModelArtifacts {
    ModelArtifacts::new(telco_transformer(), Box::new(telco_classifier())).unwrap()
}

/// Valid record with DSL internet and no add-ons.
pub fn base_record() -> CustomerRecord {
    crate::types::customer::tests::minimal_record()
}

/// New fiber customer on a month-to-month contract without protection.
pub fn high_risk_record() -> CustomerRecord {
    CustomerRecord {
        tenure: 1,
        contract: Contract::MonthToMonth,
        internet_service: InternetService::FiberOptic,
        online_security: AddonService::No,
        tech_support: AddonService::No,
        monthly_charges: 95.0,
        total_charges: 95.0,
        ..base_record()
    }
}

/// Long-tenured customer on a two-year contract without internet.
pub fn low_risk_record() -> CustomerRecord {
    CustomerRecord {
        tenure: 60,
        contract: Contract::TwoYear,
        internet_service: InternetService::No,
        multiple_lines: MultipleLines::No,
        online_security: AddonService::NoInternetService,
        online_backup: AddonService::NoInternetService,
        device_protection: AddonService::NoInternetService,
        tech_support: AddonService::NoInternetService,
        streaming_tv: AddonService::NoInternetService,
        streaming_movies: AddonService::NoInternetService,
        monthly_charges: 20.0,
        total_charges: 1200.0,
        ..base_record()
    }
}

/// Returns a fixed probability and counts how often it was asked.
pub struct StubClassifier {
    probability: f64,
    width: usize,
    calls: Arc<AtomicUsize>,
}

impl StubClassifier {
    pub fn new(probability: f64, width: usize) -> Self {
        Self {
            probability,
            width,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle on the call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn predict_proba(&self, _features: &FeatureVector<'_>) -> Result<f64, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }
}

/// Artifacts whose classifier always answers `probability`.
pub fn stub_artifacts(probability: f64) -> (ModelArtifacts, Arc<AtomicUsize>) {
    let transformer = telco_transformer();
    let stub = StubClassifier::new(probability, transformer.feature_count());
    let calls = stub.calls();
    (ModelArtifacts::new(transformer, Box::new(stub)).unwrap(), calls)
}

/// Classifier that always fails at inference time.
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn predict_proba(&self, _features: &FeatureVector<'_>) -> Result<f64, InferenceError> {
        Err(InferenceError::MissingProbability("failing".to_string()))
    }
}

/// Minimal ONNX model writer for classifier tests.
///
/// Emits a two-class model with a `[1, 2]` float input named `float_input`:
/// `Softmax` into a `probabilities` tensor, optionally followed by a
/// `ZipMap` into an `output_probability` `seq(map(int64, float))`.
pub mod onnx_fixture {
    const FLOAT: i64 = 1;
    const INT64: i64 = 7;
    const ATTRIBUTE_INTS: i64 = 7;

    fn varint(buf: &mut Vec<u8>, mut value: u64) {
        while value >= 0x80 {
            buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        buf.push(value as u8);
    }

    fn int(buf: &mut Vec<u8>, field: u32, value: i64) {
        varint(buf, u64::from(field) << 3);
        varint(buf, value as u64);
    }

    fn bytes(buf: &mut Vec<u8>, field: u32, data: &[u8]) {
        varint(buf, (u64::from(field) << 3) | 2);
        varint(buf, data.len() as u64);
        buf.extend_from_slice(data);
    }

    fn message(fields: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut buf = Vec::new();
        fields(&mut buf);
        buf
    }

    fn tensor_type(elem_type: i64, dims: &[i64]) -> Vec<u8> {
        let tensor = message(|t| {
            int(t, 1, elem_type);
            if !dims.is_empty() {
                let shape = message(|s| {
                    for dim in dims {
                        bytes(s, 1, &message(|d| int(d, 1, *dim)));
                    }
                });
                bytes(t, 2, &shape);
            }
        });
        message(|ty| bytes(ty, 1, &tensor))
    }

    fn zipmap_type() -> Vec<u8> {
        let map = message(|m| {
            int(m, 1, INT64);
            bytes(m, 2, &tensor_type(FLOAT, &[]));
        });
        let map_type = message(|ty| bytes(ty, 5, &map));
        let sequence = message(|s| bytes(s, 1, &map_type));
        message(|ty| bytes(ty, 4, &sequence))
    }

    fn value_info(name: &str, ty: &[u8]) -> Vec<u8> {
        message(|v| {
            bytes(v, 1, name.as_bytes());
            bytes(v, 2, ty);
        })
    }

    fn opset(domain: &str, version: i64) -> Vec<u8> {
        message(|o| {
            bytes(o, 1, domain.as_bytes());
            int(o, 2, version);
        })
    }

    /// Serialized model bytes.
    pub fn softmax_classifier(zipmap: bool) -> Vec<u8> {
        let softmax = message(|n| {
            bytes(n, 1, b"float_input");
            bytes(n, 2, b"probabilities");
            bytes(n, 3, b"softmax");
            bytes(n, 4, b"Softmax");
        });
        let zipmap_node = message(|n| {
            bytes(n, 1, b"probabilities");
            bytes(n, 2, b"output_probability");
            bytes(n, 3, b"zipmap");
            bytes(n, 4, b"ZipMap");
            let classes = message(|a| {
                bytes(a, 1, b"classlabels_int64s");
                int(a, 8, 0);
                int(a, 8, 1);
                int(a, 20, ATTRIBUTE_INTS);
            });
            bytes(n, 5, &classes);
            bytes(n, 7, b"ai.onnx.ml");
        });

        let graph = message(|g| {
            bytes(g, 1, &softmax);
            if zipmap {
                bytes(g, 1, &zipmap_node);
            }
            bytes(g, 2, b"churn_test_graph");
            bytes(g, 11, &value_info("float_input", &tensor_type(FLOAT, &[1, 2])));
            if zipmap {
                bytes(g, 12, &value_info("output_probability", &zipmap_type()));
            } else {
                bytes(g, 12, &value_info("probabilities", &tensor_type(FLOAT, &[1, 2])));
            }
        });

        message(|m| {
            int(m, 1, 8);
            bytes(m, 2, b"churn-tests");
            bytes(m, 7, &graph);
            bytes(m, 8, &opset("", 13));
            if zipmap {
                bytes(m, 8, &opset("ai.onnx.ml", 1));
            }
        })
    }
}
