//! HTTP surface: routes, request/response bodies and error mapping.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::service::{EmotionService, PredictionResponse, ServiceError, WarmupReport, DEFAULT_THRESHOLD};

pub const MODEL_TYPE: &str = "multi-label emotion classification";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictParams {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_status: String,
    pub model_name: String,
    pub model_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// A [`ServiceError`] rendered as `{"detail": ...}` with its status code.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            ServiceError::InvalidInput => StatusCode::BAD_REQUEST,
            ServiceError::ModelLoading => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ModelUnavailable(_) | ServiceError::InferenceError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Rejected request: {}", self.0);
        }
        (status, Json(ErrorResponse { detail: self.0.to_string() })).into_response()
    }
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Emotion Analysis API is running".to_string(),
        status: "healthy".to_string(),
    })
}

async fn health(State(service): State<EmotionService>) -> Json<HealthResponse> {
    let status = service.status();
    Json(HealthResponse {
        status: status.status_str().to_string(),
        model_status: status.model_status.to_string(),
        model_name: service.model_name().to_string(),
        model_type: MODEL_TYPE.to_string(),
    })
}

async fn warmup(State(service): State<EmotionService>) -> Json<WarmupReport> {
    Json(service.warmup().await)
}

async fn predict(
    State(service): State<EmotionService>,
    Query(params): Query<PredictParams>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let response = service.predict(&request.text, params.threshold).await?;
    Ok(Json(response))
}

/// Builds the application router with every route mounted under `prefix`
/// (`""` or `"/api"`-style, no trailing slash).
pub fn router(service: EmotionService, prefix: &str) -> Router {
    let root_path = if prefix.is_empty() { "/" } else { prefix };

    let mut app = Router::new()
        .route(root_path, get(root))
        .route(&format!("{prefix}/health"), get(health))
        .route(&format!("{prefix}/warmup"), post(warmup))
        .route(&format!("{prefix}/predict"), post(predict));
    if !prefix.is_empty() {
        app = app.route(&format!("{prefix}/"), get(root));
    }

    app.layer(CorsLayer::permissive()).with_state(service)
}

/// Serves `app` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping server"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
