//! JSON HTTP API over the planning engine.
//!
//! The index is built once at startup; handlers share the [`Engine`] behind
//! an `Arc` and never mutate it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, index size) |
//! | `GET`  | `/catalog` | Every indexed feature |
//! | `POST` | `/features/search` | Ranked, justified features for a request |
//! | `POST` | `/segments` | Features plus the segmentation report |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid campaign request: frequency must be >= 1, got 0" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_failed` (502),
//! `index_not_ready` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::TargetingError;
use crate::models::{CampaignRequest, FeatureInstance, FeatureRow};
use crate::segmentation::SegmentationReport;

/// Shared state passed to every route handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Build the router without binding. Used by [`run_server`] and by tests
/// that serve on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/catalog", get(handle_catalog))
        .route("/features/search", post(handle_search))
        .route("/segments", post(handle_segments))
        .layer(cors)
        .with_state(state)
}

/// Bootstrap the engine and serve on `[server].bind` until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Engine::bootstrap(config).await?;
    let app = build_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<TargetingError> for AppError {
    fn from(err: TargetingError) -> Self {
        let (status, code) = match &err {
            TargetingError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            TargetingError::IndexNotReady => {
                (StatusCode::SERVICE_UNAVAILABLE, "index_not_ready")
            }
            TargetingError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            TargetingError::GenerationService(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

/// Decode a JSON body, reporting shape and validation errors in the
/// standard error envelope instead of axum's plain-text rejection.
fn decode<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| bad_request(e.to_string()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    features: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let features = state
        .engine
        .search()
        .index()
        .map(|index| index.len())
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features,
    })
}

// ============ GET /catalog ============

#[derive(Serialize)]
struct CatalogResponse {
    features: Vec<FeatureInstance>,
}

async fn handle_catalog(
    State(state): State<AppState>,
) -> Result<Json<CatalogResponse>, AppError> {
    let index = state.engine.search().index()?;
    Ok(Json(CatalogResponse {
        features: index.features().cloned().collect(),
    }))
}

// ============ POST /features/search ============

#[derive(Deserialize)]
struct SearchBody {
    request: CampaignRequest,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    features: Vec<FeatureRow>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SearchResponse>, AppError> {
    let body: SearchBody = decode(body)?;
    let k = body.k.unwrap_or(state.engine.top_k());

    let results = state
        .engine
        .search()
        .search_and_reason(&body.request, k)
        .await?;

    Ok(Json(SearchResponse {
        features: results.iter().map(FeatureRow::from).collect(),
    }))
}

// ============ POST /segments ============

#[derive(Deserialize)]
struct SegmentsBody {
    request: CampaignRequest,
}

#[derive(Serialize)]
struct SegmentsResponse {
    features: Vec<FeatureRow>,
    segmentation: SegmentationReport,
}

async fn handle_segments(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SegmentsResponse>, AppError> {
    let body: SegmentsBody = decode(body)?;
    let (ranked, segmentation) = state.engine.plan(&body.request).await?;

    Ok(Json(SegmentsResponse {
        features: ranked.iter().map(FeatureRow::from).collect(),
        segmentation,
    }))
}
