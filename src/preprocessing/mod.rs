//! Fitted preprocessing artifacts applied before inference

pub mod encoder;
pub mod scaler;

pub use encoder::{HandleUnknown, OneHotEncoder};
pub use scaler::NumericScaler;
