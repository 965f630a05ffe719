//! # HTTP API
//!
//! - `research` - Start, inspect and cancel research tasks
//! - `observer` - Progress WebSocket backed by the relay
//! - `settings` - Persisted configuration, providers, agents and tools

pub mod observer;
pub mod research;
pub mod settings;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scout_core::relay::ProgressRelay;
use scout_core::swarm::Coordinator;
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub relay: ProgressRelay,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, relay: ProgressRelay) -> SharedState {
        Arc::new(Self { coordinator, relay })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

/// Error handling
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scout API",
        version = "1.0.0",
        description = "Multi-stage company research with live progress"
    ),
    paths(
        research::start_research,
        research::list_research,
        research::get_research,
        research::get_result,
        research::cancel_research,
        settings::get_config,
        settings::update_config,
        settings::get_providers,
        settings::list_agents,
        settings::list_tools,
        settings::health,
    ),
    components(schemas(
        ErrorBody,
        research::StartResearchRequest,
        research::StartResearchResponse,
        research::TaskSummary,
        research::StageSummary,
        research::TaskStatusResponse,
        research::TaskResultResponse,
        research::CancelResponse,
        settings::ConfigResponse,
        settings::ProviderInfo,
        settings::AgentInfo,
        settings::ToolInfo,
        settings::HealthResponse,
        crate::config::PersistedConfig,
    )),
    tags(
        (name = "research", description = "Research tasks"),
        (name = "settings", description = "Configuration and discovery")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    let spec = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], spec)
}

pub fn router(state: SharedState) -> Router {
    let research_routes = Router::new()
        .route("/", get(research::list_research).post(research::start_research))
        .route("/:id", get(research::get_research))
        .route("/:id/result", get(research::get_result))
        .route("/:id/cancel", post(research::cancel_research))
        .route("/:id/ws", get(observer::observe));

    Router::new()
        .nest("/api/v1/research", research_routes)
        .route("/api/v1/config", get(settings::get_config).patch(settings::update_config))
        .route("/api/v1/providers", get(settings::get_providers))
        .route("/api/v1/agents", get(settings::list_agents))
        .route("/api/v1/tools", get(settings::list_tools))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .route("/health", get(settings::health))
        .with_state(state)
}
