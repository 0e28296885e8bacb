//! HTTP API: health endpoints and `POST /predict`.

use crate::config::CorsConfig;
use crate::error::{PredictionError, ValidationErrors};
use crate::metrics::PredictionMetrics;
use crate::service::PredictionService;
use crate::types::PredictionResponse;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::InvalidHeaderValue;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

/// Shared application state
pub struct AppState {
    pub service: PredictionService,
    pub metrics: Arc<PredictionMetrics>,
}

impl AppState {
    pub fn new(service: PredictionService, metrics: Arc<PredictionMetrics>) -> Self {
        Self { service, metrics }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(detailed_health))
        .route("/predict", post(predict_churn))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer allowing the configured browser origins, with credentials.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true))
}

/// `GET /` - liveness.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "model_loaded": true }))
}

/// `GET /health` - reports the model feature count.
pub async fn detailed_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "model_features_count": state.service.feature_count(),
    }))
}

/// `POST /predict` - score one customer record.
pub async fn predict_churn(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);

    span.in_scope(|| -> Result<Json<PredictionResponse>, ApiError> {
        let Json(body) = payload.map_err(|rejection| {
            state.metrics.record_rejection();
            warn!(error = %rejection.body_text(), "Rejected unreadable request body");
            ApiError::Validation(ValidationErrors::body("json_invalid", rejection.body_text()))
        })?;

        let start = Instant::now();
        match state.service.predict_json(&body) {
            Ok(result) => {
                let latency = start.elapsed();
                state
                    .metrics
                    .record_prediction(latency, result.probability, result.label);
                debug!(
                    probability = result.probability,
                    label = result.label.as_str(),
                    latency_us = latency.as_micros() as u64,
                    "Prediction served"
                );
                Ok(Json(PredictionResponse::from(result)))
            }
            Err(PredictionError::Validation(errors)) => {
                state.metrics.record_rejection();
                warn!(error = %errors, "Rejected invalid customer record");
                Err(ApiError::Validation(errors))
            }
            Err(err) => {
                state.metrics.record_failure();
                error!(error = %err, "Prediction failed");
                Err(ApiError::Internal(err.to_string()))
            }
        }
    })
}

/// Error responses of the API.
#[derive(Debug)]
pub enum ApiError {
    /// 422 with per-field detail
    Validation(ValidationErrors),
    /// 500 with a message
    Internal(String),
}

#[derive(Debug, Serialize)]
struct FieldDetail<'a> {
    loc: Vec<&'a str>,
    msg: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                let detail: Vec<FieldDetail<'_>> = errors
                    .errors()
                    .iter()
                    .map(|e| FieldDetail {
                        loc: if e.field.is_empty() {
                            vec!["body"]
                        } else {
                            vec!["body", e.field.as_str()]
                        },
                        msg: &e.message,
                        kind: e.kind,
                    })
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": detail })),
                )
                    .into_response()
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": message })),
            )
                .into_response(),
        }
    }
}
