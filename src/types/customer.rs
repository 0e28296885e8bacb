//! Customer record submitted for churn scoring

use crate::error::{FieldError, ValidationErrors};
use serde::Serialize;
use serde_json::{Map, Value};

/// A closed set of string levels accepted for one categorical field.
pub trait Categorical: Sized + Copy + Default + 'static {
    /// Accepted wire values, in declaration order
    const LEVELS: &'static [(&'static str, Self)];

    /// Wire value of this level (also the encoder's category label)
    fn as_str(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::LEVELS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, level)| *level)
    }
}

macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident { $first:ident => $first_str:literal $(, $variant:ident => $str:literal)* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
        pub enum $name {
            #[default]
            #[serde(rename = $first_str)]
            $first,
            $(
                #[serde(rename = $str)]
                $variant,
            )*
        }

        impl Categorical for $name {
            const LEVELS: &'static [(&'static str, Self)] =
                &[($first_str, $name::$first) $(, ($str, $name::$variant))*];

            fn as_str(self) -> &'static str {
                match self {
                    $name::$first => $first_str,
                    $($name::$variant => $str,)*
                }
            }
        }
    };
}

categorical!(
    /// Customer gender
    Gender { Male => "Male", Female => "Female" }
);

categorical!(
    /// Plain two-valued flag used by Partner, Dependents, PhoneService, PaperlessBilling
    YesNo { Yes => "Yes", No => "No" }
);

categorical!(
    /// Multiple phone lines subscription
    MultipleLines { Yes => "Yes", No => "No", NoPhoneService => "No phone service" }
);

categorical!(
    /// Internet service type
    InternetService { Dsl => "DSL", FiberOptic => "Fiber optic", No => "No" }
);

categorical!(
    /// Subscription state of one add-on service
    AddonService { Yes => "Yes", No => "No", NoInternetService => "No internet service" }
);

categorical!(
    /// Contract term
    Contract { MonthToMonth => "Month-to-month", OneYear => "One year", TwoYear => "Two year" }
);

categorical!(
    /// Billing payment method
    PaymentMethod {
        ElectronicCheck => "Electronic check",
        MailedCheck => "Mailed check",
        BankTransfer => "Bank transfer (automatic)",
        CreditCard => "Credit card (automatic)",
    }
);

impl AddonService {
    /// 1 only for an active subscription; "No" and "No internet service" both count as 0.
    pub fn indicator(self) -> u8 {
        match self {
            AddonService::Yes => 1,
            AddonService::No | AddonService::NoInternetService => 0,
        }
    }
}

/// Highest accepted tenure in months
pub const MAX_TENURE_MONTHS: u32 = 72;

/// A fully validated customer record.
///
/// Only [`CustomerRecord::from_json`] (or direct construction in code) produces
/// one; every categorical field is a closed enum so out-of-domain values cannot
/// reach the feature transformer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub gender: Gender,
    /// 0 or 1
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: u8,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    /// Months with the company, 0..=72
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: YesNo,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: MultipleLines,
    #[serde(rename = "InternetService")]
    pub internet_service: InternetService,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: AddonService,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: AddonService,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: AddonService,
    #[serde(rename = "TechSupport")]
    pub tech_support: AddonService,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: AddonService,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: AddonService,
    #[serde(rename = "Contract")]
    pub contract: Contract,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: YesNo,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Validate a raw JSON request body field by field.
    ///
    /// Every problem is collected, so a single rejection reports all bad
    /// fields at once. Unknown extra keys are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationErrors> {
        let Some(object) = body.as_object() else {
            return Err(ValidationErrors::body(
                "model_attributes_type",
                "Input should be a valid JSON object",
            ));
        };

        let mut reader = FieldReader::new(object);
        let record = CustomerRecord {
            gender: reader.categorical("gender"),
            senior_citizen: reader.binary_flag("SeniorCitizen"),
            partner: reader.categorical("Partner"),
            dependents: reader.categorical("Dependents"),
            tenure: reader.integer("tenure", MAX_TENURE_MONTHS),
            phone_service: reader.categorical("PhoneService"),
            multiple_lines: reader.categorical("MultipleLines"),
            internet_service: reader.categorical("InternetService"),
            online_security: reader.categorical("OnlineSecurity"),
            online_backup: reader.categorical("OnlineBackup"),
            device_protection: reader.categorical("DeviceProtection"),
            tech_support: reader.categorical("TechSupport"),
            streaming_tv: reader.categorical("StreamingTV"),
            streaming_movies: reader.categorical("StreamingMovies"),
            contract: reader.categorical("Contract"),
            paperless_billing: reader.categorical("PaperlessBilling"),
            payment_method: reader.categorical("PaymentMethod"),
            monthly_charges: reader.non_negative("MonthlyCharges"),
            total_charges: reader.non_negative("TotalCharges"),
        };

        reader.finish(record)
    }

    /// The six add-on subscriptions, in the order used for derived features.
    pub fn addon_services(&self) -> [AddonService; 6] {
        [
            self.online_security,
            self.online_backup,
            self.device_protection,
            self.tech_support,
            self.streaming_tv,
            self.streaming_movies,
        ]
    }

    /// Raw values of the nine encoder inputs, in encoder feature order.
    pub fn categorical_values(&self) -> [&'static str; 9] {
        [
            self.gender.as_str(),
            self.partner.as_str(),
            self.dependents.as_str(),
            self.phone_service.as_str(),
            self.multiple_lines.as_str(),
            self.internet_service.as_str(),
            self.contract.as_str(),
            self.paperless_billing.as_str(),
            self.payment_method.as_str(),
        ]
    }
}

/// Pulls typed fields out of a JSON object, recording each failure and
/// substituting a placeholder so the remaining fields are still checked.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    errors: ValidationErrors,
}

impl<'a> FieldReader<'a> {
    fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            errors: ValidationErrors::new(),
        }
    }

    fn field(&mut self, name: &str) -> Option<&'a Value> {
        match self.object.get(name) {
            Some(value) => Some(value),
            None => {
                self.errors
                    .push(FieldError::new(name, "missing", "Field required"));
                None
            }
        }
    }

    fn categorical<T: Categorical>(&mut self, name: &str) -> T {
        let Some(value) = self.field(name) else {
            return T::default();
        };

        if let Some(level) = value.as_str().and_then(T::parse) {
            return level;
        }

        let expected: Vec<String> = T::LEVELS
            .iter()
            .map(|(level, _)| format!("'{level}'"))
            .collect();
        self.errors.push(FieldError::new(
            name,
            "literal_error",
            format!("Input should be {}", join_alternatives(&expected)),
        ));
        T::default()
    }

    fn binary_flag(&mut self, name: &str) -> u8 {
        let Some(value) = self.field(name) else {
            return 0;
        };

        match value.as_u64() {
            Some(0) => 0,
            Some(1) => 1,
            _ => {
                self.errors
                    .push(FieldError::new(name, "literal_error", "Input should be 0 or 1"));
                0
            }
        }
    }

    fn integer(&mut self, name: &str, max: u32) -> u32 {
        let Some(value) = self.field(name) else {
            return 0;
        };

        let Some(number) = value.as_i64() else {
            self.errors.push(FieldError::new(
                name,
                "int_type",
                "Input should be a valid integer",
            ));
            return 0;
        };

        if number < 0 {
            self.errors.push(FieldError::new(
                name,
                "greater_than_equal",
                "Input should be greater than or equal to 0",
            ));
            return 0;
        }
        if number > i64::from(max) {
            self.errors.push(FieldError::new(
                name,
                "less_than_equal",
                format!("Input should be less than or equal to {max}"),
            ));
            return 0;
        }

        number as u32
    }

    fn non_negative(&mut self, name: &str) -> f64 {
        let Some(value) = self.field(name) else {
            return 0.0;
        };

        let Some(number) = value.as_f64().filter(|n| n.is_finite()) else {
            self.errors.push(FieldError::new(
                name,
                "float_type",
                "Input should be a valid number",
            ));
            return 0.0;
        };

        if number < 0.0 {
            self.errors.push(FieldError::new(
                name,
                "greater_than_equal",
                "Input should be greater than or equal to 0",
            ));
            return 0.0;
        }

        number
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

fn join_alternatives(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}
