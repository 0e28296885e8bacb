//! Classifier artifacts and their loading

pub mod classifier;
pub mod loader;

pub use classifier::{Classifier, LinearClassifier, OnnxClassifier};
pub use loader::ModelArtifacts;
