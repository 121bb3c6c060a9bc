//! HTTP server for cover analysis.

use crate::config::ServerConfig;
use crate::ocr::build_analyzer;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::{MultipartError, MultipartRejection}},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use coverscan::domain::{CoverAnalysisResponse, HealthResponse};
use coverscan::pipeline::CoverAnalyzer;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Largest accepted upload.
pub const MAX_FILE_SIZE: usize = 4 * 1024 * 1024;
/// Request body cap; above `MAX_FILE_SIZE` so oversized uploads get a precise error.
const BODY_LIMIT: usize = 4 * MAX_FILE_SIZE;
const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Application state shared across handlers
pub struct AppState {
    analyzer: CoverAnalyzer,
}

impl AppState {
    pub fn new(analyzer: CoverAnalyzer) -> Self {
        Self { analyzer }
    }
}

/// Request errors reported as `{"detail": ...}`.
#[derive(Debug)]
enum AppError {
    InvalidContentType(String),
    FileTooLarge(usize),
    BodyTooLarge,
    Malformed(String),
    Unprocessable(String),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::BodyTooLarge
        } else {
            AppError::Malformed(err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::InvalidContentType(content_type) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid content type: {content_type}. Accepted: JPEG, PNG, WebP"),
            ),
            AppError::FileTooLarge(size) => (
                StatusCode::BAD_REQUEST,
                format!("File too large: {size} bytes. Max: {MAX_FILE_SIZE} bytes"),
            ),
            AppError::BodyTooLarge => (
                StatusCode::BAD_REQUEST,
                format!("File too large: more than {BODY_LIMIT} bytes. Max: {MAX_FILE_SIZE} bytes"),
            ),
            AppError::Malformed(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Builds the router with its middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing analyzer...");
    let analyzer = build_analyzer(&config.engine)?;
    let state = Arc::new(AppState::new(analyzer));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health  - Health check");
    info!("  POST /analyze - Book cover analysis (multipart field 'file')");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Cover analysis endpoint
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CoverAnalysisResponse>, AppError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut multipart =
        multipart.map_err(|rejection| AppError::Unprocessable(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("none").to_string();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            warn!(request_id = %request_id, content_type = %content_type, "Rejected upload");
            return Err(AppError::InvalidContentType(content_type));
        }

        let bytes = field.bytes().await?;
        if bytes.len() > MAX_FILE_SIZE {
            warn!(request_id = %request_id, size = bytes.len(), "Rejected upload");
            return Err(AppError::FileTooLarge(bytes.len()));
        }

        info!(
            request_id = %request_id,
            content_type = %content_type,
            size = bytes.len(),
            "Analyzing cover"
        );
        let start = Instant::now();
        let response = state.analyzer.analyze(&bytes).await;
        info!(
            request_id = %request_id,
            success = response.analysis.is_success,
            matches = response.matched_books.len(),
            total_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Analysis finished"
        );
        return Ok(Json(response));
    }

    Err(AppError::Unprocessable(
        "Missing required multipart field 'file'".to_string(),
    ))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
