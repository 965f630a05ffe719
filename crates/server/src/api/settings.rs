//! # Settings & Discovery API

use axum::{extract::State, Json};
use scout_core::models::LlmProvider;
use scout_core::swarm::TaskStatus;
use scout_core::tools::catalogue;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::SharedState;
use crate::config::PersistedConfig;

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    /// Changes apply on the next server start
    pub restart_required: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub env_var: String,
    pub configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentInfo {
    pub name: String,
    pub stage: String,
    pub checkpoint: u8,
    pub description: String,
    pub capabilities: Vec<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub parameters: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_tasks: usize,
}

/// Get persisted configuration
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "settings",
    responses((status = 200, description = "Persisted configuration", body = ConfigResponse))
)]
pub async fn get_config() -> Json<ConfigResponse> {
    Json(ConfigResponse {
        config: PersistedConfig::load().await,
        restart_required: false,
    })
}

/// Update configuration (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "settings",
    request_body = PersistedConfig,
    responses((status = 200, description = "Merged configuration", body = ConfigResponse))
)]
pub async fn update_config(Json(updates): Json<PersistedConfig>) -> Json<ConfigResponse> {
    let mut config = PersistedConfig::load().await;
    config.merge(updates);

    if let Err(e) = config.save().await {
        tracing::error!(error = %e, "failed to save config");
    }

    Json(ConfigResponse {
        config,
        restart_required: true,
    })
}

/// List LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "settings",
    responses((status = 200, description = "Supported providers", body = Vec<ProviderInfo>))
)]
pub async fn get_providers() -> Json<Vec<ProviderInfo>> {
    let providers = LlmProvider::all()
        .into_iter()
        .map(|p| ProviderInfo {
            id: serde_json::to_value(p)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            name: p.display_name().to_string(),
            base_url: p.default_base_url().to_string(),
            env_var: p.api_key_env().to_string(),
            configured: std::env::var(p.api_key_env()).is_ok(),
        })
        .collect();
    Json(providers)
}

/// List the pipeline's agents in stage order
#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "settings",
    responses((status = 200, description = "Agent cards", body = Vec<AgentInfo>))
)]
pub async fn list_agents(State(state): State<SharedState>) -> Json<Vec<AgentInfo>> {
    let agents = state
        .coordinator
        .agent_cards()
        .into_iter()
        .map(|card| AgentInfo {
            name: card.name,
            stage: card.stage.to_string(),
            checkpoint: card.stage.checkpoint(),
            description: card.description,
            capabilities: card.capabilities,
            tools: card.tools.iter().map(|t| t.to_string()).collect(),
        })
        .collect();
    Json(agents)
}

/// List tools with their argument schemas
#[utoipa::path(
    get,
    path = "/api/v1/tools",
    tag = "settings",
    responses((status = 200, description = "Tool catalogue", body = Vec<ToolInfo>))
)]
pub async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(
        catalogue()
            .into_iter()
            .map(|spec| ToolInfo {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                parameters: spec.parameters,
            })
            .collect(),
    )
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "settings",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let active_tasks = state
        .coordinator
        .list()
        .await
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Running))
        .count();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_tasks,
    })
}
