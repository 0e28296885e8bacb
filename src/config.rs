//! Configuration management for the churn prediction service

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "CHURN_CONFIG";

/// Which classifier artifact format to load
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// ONNX model run through ONNX Runtime
    #[default]
    Onnx,
    /// Logistic regression coefficients stored as JSON
    Linear,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub prediction: PredictionConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory containing the artifact files
    pub dir: PathBuf,
    /// Classifier artifact format
    pub classifier: ClassifierKind,
    /// Classifier file, relative to `dir`
    pub model_file: String,
    /// Fitted one-hot encoder, relative to `dir`
    pub encoder_file: String,
    /// Fitted numeric scaler, relative to `dir`
    pub scaler_file: String,
    /// Optional list of training-time feature names, relative to `dir`
    pub feature_names_file: Option<String>,
    /// Number of intra-op threads for ONNX inference
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            classifier: ClassifierKind::Onnx,
            model_file: "churn_model.onnx".to_string(),
            encoder_file: "encoder.json".to_string(),
            scaler_file: "scaler.json".to_string(),
            feature_names_file: None,
            onnx_threads: 1,
        }
    }
}

impl ArtifactsConfig {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.dir.join(&self.encoder_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler_file)
    }

    pub fn feature_names_path(&self) -> Option<PathBuf> {
        self.feature_names_file.as_ref().map(|file| self.dir.join(file))
    }
}

/// Decision configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Probability at or above which a customer is labelled as churning
    pub threshold: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// Cross-origin configuration for browser clients
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "https://customer-churn-predictor-eta.vercel.app".to_string(),
            ],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Periodic metrics summary configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from `$CHURN_CONFIG` or the default file, with env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file falls back to defaults; `CHURN__SECTION__KEY`
    /// environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("CHURN")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        let threshold = self.prediction.threshold;
        ensure!(
            (0.0..=1.0).contains(&threshold),
            "prediction.threshold must lie in [0, 1], got {threshold}"
        );
        ensure!(
            self.artifacts.onnx_threads > 0,
            "artifacts.onnx_threads must be at least 1"
        );
        ensure!(
            matches!(self.logging.format.as_str(), "json" | "pretty"),
            "logging.format must be \"json\" or \"pretty\", got {:?}",
            self.logging.format
        );
        Ok(())
    }
}
