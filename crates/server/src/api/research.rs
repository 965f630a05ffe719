//! # Research API
//!
//! Endpoints for starting, inspecting and cancelling research tasks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use scout_core::swarm::{CancelOutcome, CoordinatorError, StageState, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{ApiError, ErrorBody, SharedState};

/// Request to start a research task
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartResearchRequest {
    /// Company to research
    pub subject: String,
    /// Caller-chosen task ID
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartResearchResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskSummary {
    pub task_id: String,
    pub subject: String,
    pub status: String,
    pub progress: u8,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StageSummary {
    pub name: String,
    pub status: String,
    pub duration_ms: Option<u64>,
    pub degraded: Option<String>,
    pub error: Option<String>,
}

impl From<&StageState> for StageSummary {
    fn from(stage: &StageState) -> Self {
        Self {
            name: stage.name.to_string(),
            status: serde_json::to_value(stage.status)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            duration_ms: stage.duration_ms,
            degraded: stage.degraded.clone(),
            error: stage.error.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub subject: String,
    pub status: String,
    pub progress: u8,
    pub current_stage: Option<String>,
    pub stages: Vec<StageSummary>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl From<&Task> for TaskStatusResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            subject: task.subject.clone(),
            status: task.status.as_str().to_string(),
            progress: task.progress,
            current_stage: task.current_stage.map(|s| s.to_string()),
            stages: task.stages.iter().map(StageSummary::from).collect(),
            error: task.error.as_ref().map(|e| e.message.clone()),
            created_at: task.created_at.to_rfc3339(),
            started_at: task.started_at.map(|t| t.to_rfc3339()),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub subject: String,
    pub status: String,
    pub duration_ms: Option<i64>,
    /// Final report, once report generation ran
    #[schema(value_type = Option<Object>)]
    pub report: Option<Value>,
    /// Stage results keyed by stage name
    #[schema(value_type = Object)]
    pub context: Value,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    pub task_id: String,
    pub outcome: String,
}

async fn find(state: &SharedState, id: &str) -> Result<Task, ApiError> {
    state
        .coordinator
        .get_status(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("task {} not found", id)))
}

/// Start a research task
#[utoipa::path(
    post,
    path = "/api/v1/research",
    tag = "research",
    request_body = StartResearchRequest,
    responses(
        (status = 202, description = "Task accepted", body = StartResearchResponse),
        (status = 400, description = "Empty subject", body = ErrorBody),
        (status = 409, description = "Task ID already in use", body = ErrorBody)
    )
)]
pub async fn start_research(
    State(state): State<SharedState>,
    Json(req): Json<StartResearchRequest>,
) -> Result<(StatusCode, Json<StartResearchResponse>), ApiError> {
    let started = match &req.task_id {
        Some(id) => state.coordinator.start_with_id(id, &req.subject).await,
        None => state.coordinator.start(&req.subject).await,
    };
    let task_id = started.map_err(|e| match e {
        CoordinatorError::EmptySubject => ApiError::BadRequest(e.to_string()),
        CoordinatorError::DuplicateTask(_) => ApiError::Conflict(e.to_string()),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResearchResponse {
            task_id,
            status: "pending".to_string(),
            message: format!("Research started for {}", req.subject.trim()),
        }),
    ))
}

/// List all known tasks
#[utoipa::path(
    get,
    path = "/api/v1/research",
    tag = "research",
    responses((status = 200, description = "Known tasks, oldest first", body = Vec<TaskSummary>))
)]
pub async fn list_research(State(state): State<SharedState>) -> Json<Vec<TaskSummary>> {
    let tasks = state.coordinator.list().await;
    Json(
        tasks
            .iter()
            .map(|t| TaskSummary {
                task_id: t.id.clone(),
                subject: t.subject.clone(),
                status: t.status.as_str().to_string(),
                progress: t.progress,
                created_at: t.created_at.to_rfc3339(),
            })
            .collect(),
    )
}

/// Current status of a task
#[utoipa::path(
    get,
    path = "/api/v1/research/{id}",
    tag = "research",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task snapshot", body = TaskStatusResponse),
        (status = 404, description = "Unknown task", body = ErrorBody)
    )
)]
pub async fn get_research(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task = find(&state, &id).await?;
    Ok(Json(TaskStatusResponse::from(&task)))
}

/// Accumulated context and final report
#[utoipa::path(
    get,
    path = "/api/v1/research/{id}/result",
    tag = "research",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task result", body = TaskResultResponse),
        (status = 404, description = "Unknown task", body = ErrorBody)
    )
)]
pub async fn get_result(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResultResponse>, ApiError> {
    let task = find(&state, &id).await?;

    let mut context = serde_json::Map::new();
    for entry in task.context.entries() {
        let value = serde_json::to_value(entry).map_err(anyhow::Error::from)?;
        context.insert(entry.stage.to_string(), value);
    }
    let report = task
        .report()
        .map(serde_json::to_value)
        .transpose()
        .map_err(anyhow::Error::from)?;

    Ok(Json(TaskResultResponse {
        task_id: task.id.clone(),
        subject: task.subject.clone(),
        status: task.status.as_str().to_string(),
        duration_ms: task.duration_ms(),
        report,
        context: Value::Object(context),
        error: task.error.as_ref().map(|e| e.message.clone()),
    }))
}

/// Request cooperative cancellation
#[utoipa::path(
    post,
    path = "/api/v1/research/{id}/cancel",
    tag = "research",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Cancellation outcome", body = CancelResponse),
        (status = 404, description = "Unknown task", body = ErrorBody)
    )
)]
pub async fn cancel_research(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let outcome = match state.coordinator.cancel(&id).await {
        CancelOutcome::NotFound => return Err(ApiError::NotFound(format!("task {} not found", id))),
        CancelOutcome::Requested => "requested",
        CancelOutcome::AlreadyFinished => "already_finished",
    };
    Ok(Json(CancelResponse {
        task_id: id,
        outcome: outcome.to_string(),
    }))
}
