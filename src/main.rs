//! Churn Prediction Service - Main Entry Point
//!
//! Loads the preprocessing and classifier artifacts, then serves
//! predictions over HTTP until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use churn_prediction_service::{
    api::{self, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, PredictionMetrics},
    models::ModelArtifacts,
    service::PredictionService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_logging(&config.logging)?;
    info!("Starting Churn Prediction Service");
    info!(
        "Decision threshold: {:.2}, artifacts dir: {}",
        config.prediction.threshold,
        config.artifacts.dir.display()
    );

    // Startup fails if the artifacts are missing or incompatible
    let artifacts = ModelArtifacts::load(&config.artifacts)
        .context("Failed to load model artifacts")?;
    info!(
        "Model loaded: {} ({} features)",
        artifacts.classifier().name(),
        artifacts.feature_count()
    );

    let metrics = Arc::new(PredictionMetrics::new());
    let service = PredictionService::new(artifacts, config.prediction.threshold);
    let state = Arc::new(AppState::new(service, Arc::clone(&metrics)));

    let reporter = MetricsReporter::new(
        Arc::clone(&metrics),
        config.metrics.report_interval_secs,
    );
    tokio::spawn(reporter.start());

    let cors = api::cors_layer(&config.cors).context("Invalid CORS origin")?;
    let app = api::router(state).layer(cors);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Print final summary
    info!("Service shutting down...");
    metrics.log_summary();

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level {:?}", config.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
