//! Feature transformation for churn model inference.
//!
//! Turns a validated [`CustomerRecord`] into the feature vector the
//! classifier was trained on: derived add-on features, scaled numeric
//! columns, then one-hot encoded categorical columns, projected onto the
//! fixed model feature schema.

use crate::error::{ArtifactError, TransformError};
use crate::preprocessing::{NumericScaler, OneHotEncoder};
use crate::types::customer::{CustomerRecord, InternetService};
use std::collections::HashMap;

/// Numeric inputs of the scaler, in model order.
pub const NUMERICAL_FEATURES: [&str; 6] = [
    "SeniorCitizen",
    "tenure",
    "MonthlyCharges",
    "TotalCharges",
    "Num_Addon_Services",
    "Has_Internet_No_Security",
];

/// Categorical inputs of the encoder, in model order.
pub const CATEGORICAL_FEATURES: [&str; 9] = [
    "gender",
    "Partner",
    "Dependents",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
];

/// Number of active add-on subscriptions (0..=6).
pub fn num_addon_services(record: &CustomerRecord) -> u8 {
    record
        .addon_services()
        .iter()
        .map(|service| service.indicator())
        .sum()
}

/// 1 when the customer has internet but neither online security nor tech support.
pub fn has_internet_no_security(record: &CustomerRecord) -> u8 {
    let has_internet = record.internet_service != InternetService::No;
    let unprotected = record.online_security.indicator() == 0
        && record.tech_support.indicator() == 0;
    u8::from(has_internet && unprotected)
}

/// Ordered feature names the classifier expects (`MODEL_FEATURES`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self, ArtifactError> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(ArtifactError::Incompatible(format!(
                    "duplicate model feature {name}"
                )));
            }
        }
        Ok(Self { names, index })
    }

    /// Numeric feature names followed by the encoder's generated column names.
    pub fn from_encoder(encoder: &OneHotEncoder) -> Result<Self, ArtifactError> {
        let names = NUMERICAL_FEATURES
            .iter()
            .map(|name| name.to_string())
            .chain(encoder.feature_names_out())
            .collect();
        Self::new(names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Place named columns at their schema positions; absent columns stay 0.
    pub fn project<'a, I>(&self, columns: I) -> Result<Vec<f32>, TransformError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut values = vec![0.0; self.names.len()];
        for (name, value) in columns {
            let position = self
                .position(name)
                .ok_or_else(|| TransformError::UnexpectedColumn(name.to_string()))?;
            values[position] = value;
        }
        Ok(values)
    }
}

/// A single-row model input laid out according to a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'s> {
    schema: &'s FeatureSchema,
    values: Vec<f32>,
}

impl<'s> FeatureVector<'s> {
    #[cfg(test)]
    pub(crate) fn from_values(schema: &'s FeatureSchema, values: Vec<f32>) -> Self {
        Self { schema, values }
    }

    pub fn schema(&self) -> &'s FeatureSchema {
        self.schema
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the named column.
    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema.position(name).map(|i| self.values[i])
    }

    /// Column names paired with their values, in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Applies the fitted encoder and scaler to customer records.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    encoder: OneHotEncoder,
    scaler: NumericScaler,
    encoded_names: Vec<String>,
    schema: FeatureSchema,
}

impl FeatureTransformer {
    /// Pair an encoder and scaler, checking they were fitted on the expected columns.
    pub fn new(encoder: OneHotEncoder, scaler: NumericScaler) -> Result<Self, ArtifactError> {
        encoder.validate()?;
        scaler.validate()?;

        if encoder.feature_names_in() != CATEGORICAL_FEATURES {
            return Err(ArtifactError::Incompatible(format!(
                "encoder was fitted on {:?}, expected {:?}",
                encoder.feature_names_in(),
                CATEGORICAL_FEATURES
            )));
        }
        if scaler.feature_names_in() != NUMERICAL_FEATURES {
            return Err(ArtifactError::Incompatible(format!(
                "scaler was fitted on {:?}, expected {:?}",
                scaler.feature_names_in(),
                NUMERICAL_FEATURES
            )));
        }

        let schema = FeatureSchema::from_encoder(&encoder)?;
        let encoded_names = encoder.feature_names_out();

        Ok(Self {
            encoder,
            scaler,
            encoded_names,
            schema,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Number of model features produced.
    pub fn feature_count(&self) -> usize {
        self.schema.len()
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }

    /// Transform a validated record into the model feature vector.
    pub fn transform(&self, record: &CustomerRecord) -> Result<FeatureVector<'_>, TransformError> {
        let numeric = [
            f64::from(record.senior_citizen),
            f64::from(record.tenure),
            record.monthly_charges,
            record.total_charges,
            f64::from(num_addon_services(record)),
            f64::from(has_internet_no_security(record)),
        ];
        self.assemble(&numeric, &record.categorical_values())
    }

    /// Scale and encode raw column values and project them onto the schema.
    ///
    /// `numeric` follows [`NUMERICAL_FEATURES`], `categorical` follows
    /// [`CATEGORICAL_FEATURES`]. Categorical values are not domain-checked here;
    /// levels the encoder does not know follow its unknown-value policy.
    pub fn assemble(
        &self,
        numeric: &[f64],
        categorical: &[&str],
    ) -> Result<FeatureVector<'_>, TransformError> {
        let scaled = self.scaler.transform(numeric)?;
        let encoded = self.encoder.transform(categorical)?;

        let columns = self
            .scaler
            .feature_names_in()
            .iter()
            .map(String::as_str)
            .zip(scaled)
            .chain(self.encoded_names.iter().map(String::as_str).zip(encoded));
        let values = self.schema.project(columns)?;

        Ok(FeatureVector {
            schema: &self.schema,
            values,
        })
    }
}
