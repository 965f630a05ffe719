//! # Pipeline Coordinator
//!
//! Owns every task's state machine and drives its stages in order.
//!
//! ```text
//! Pending ──► Running(stage_0) ──► … ──► Running(stage_n) ──► Completed
//!    │               │                          │
//!    └── cancel ─────┴──── fatal / cancel ──────┴──► Failed / Cancelled
//! ```
//!
//! Each task runs on its own spawned worker, so starting a task never waits
//! on another. A semaphore caps how many run at once; the rest stay Pending.

use crate::agents::{AgentCard, AgentError, AgentRequest};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::bus::EventBus;
use super::events::{EventStatus, ProgressEvent};
use super::payload::StagePayload;
use super::pipeline::{FailurePolicy, Pipeline, StageDefinition, StageName};
use super::store::SnapshotSink;
use super::task::{StageResult, StageStatus, Task, TaskError, TaskErrorKind, TaskStatus};

/// Configuration for the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Tasks running at the same time (default: 4)
    pub max_concurrent_tasks: usize,
    /// Overall budget per stage in seconds (0 disables)
    pub stage_deadline_secs: u64,
    /// Buffered events per task subscriber
    pub event_capacity: usize,
    /// How long finished tasks stay queryable in memory (0 keeps them forever)
    pub finished_task_ttl_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            stage_deadline_secs: 300,
            event_capacity: 256,
            finished_task_ttl_secs: 86_400,
        }
    }
}

impl CoordinatorConfig {
    pub fn stage_deadline(&self) -> Option<Duration> {
        (self.stage_deadline_secs > 0).then(|| Duration::from_secs(self.stage_deadline_secs))
    }

    pub fn finished_task_ttl(&self) -> Option<Duration> {
        (self.finished_task_ttl_secs > 0).then(|| Duration::from_secs(self.finished_task_ttl_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("subject must not be empty")]
    EmptySubject,
    #[error("task {0} already exists")]
    DuplicateTask(String),
}

/// Result of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Requested,
    AlreadyFinished,
    NotFound,
}

struct TaskEntry {
    task: RwLock<Task>,
    cancel: CancellationToken,
    status: watch::Sender<TaskStatus>,
    finished_at: std::sync::Mutex<Option<Instant>>,
}

impl TaskEntry {
    fn expired(&self, ttl: Option<Duration>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        self.finished_at
            .lock()
            .ok()
            .and_then(|at| *at)
            .map(|at| at.elapsed() >= ttl)
            .unwrap_or(false)
    }
}

/// The pipeline coordinator
pub struct Coordinator {
    pipeline: Pipeline,
    tasks: RwLock<HashMap<String, Arc<TaskEntry>>>,
    bus: Arc<EventBus>,
    sink: Arc<dyn SnapshotSink>,
    permits: Arc<Semaphore>,
    finished_ttl: Option<Duration>,
}

impl Coordinator {
    pub fn new(pipeline: Pipeline, config: CoordinatorConfig, sink: Arc<dyn SnapshotSink>) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            tasks: RwLock::new(HashMap::new()),
            bus: Arc::new(EventBus::new(config.event_capacity)),
            sink,
            permits: Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1))),
            finished_ttl: config.finished_task_ttl(),
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Cards of the agents behind each stage, in stage order
    pub fn agent_cards(&self) -> Vec<AgentCard> {
        self.pipeline.stages().iter().map(|s| s.agent.card()).collect()
    }

    /// Create a task and start it in the background
    pub async fn start(self: &Arc<Self>, subject: &str) -> Result<String, CoordinatorError> {
        self.start_with_id(&uuid::Uuid::new_v4().to_string(), subject).await
    }

    /// Like [`Coordinator::start`] with a caller-chosen ID
    pub async fn start_with_id(self: &Arc<Self>, task_id: &str, subject: &str) -> Result<String, CoordinatorError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(CoordinatorError::EmptySubject);
        }

        let entry = Arc::new(TaskEntry {
            task: RwLock::new(Task::new(task_id, subject, &self.pipeline)),
            cancel: CancellationToken::new(),
            status: watch::channel(TaskStatus::Pending).0,
            finished_at: std::sync::Mutex::new(None),
        });

        {
            let mut tasks = self.tasks.write().await;
            self.evict_expired(&mut tasks);
            if tasks.contains_key(task_id) {
                return Err(CoordinatorError::DuplicateTask(task_id.to_string()));
            }
            tasks.insert(task_id.to_string(), entry.clone());
        }

        tracing::info!(task_id, subject, "task accepted");
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run_task(entry).await });
        Ok(task_id.to_string())
    }

    /// Drop finished tasks older than the retention window. Their final
    /// snapshots already went to the sink.
    fn evict_expired(&self, tasks: &mut HashMap<String, Arc<TaskEntry>>) {
        let before = tasks.len();
        tasks.retain(|_, entry| !entry.expired(self.finished_ttl));
        let evicted = before - tasks.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted finished tasks");
        }
    }

    async fn lookup(&self, task_id: &str) -> Option<Arc<TaskEntry>> {
        let entry = self.tasks.read().await.get(task_id).cloned()?;
        (!entry.expired(self.finished_ttl)).then_some(entry)
    }

    /// Snapshot of a task
    pub async fn get_status(&self, task_id: &str) -> Option<Task> {
        let entry = self.lookup(task_id).await?;
        let task = entry.task.read().await.clone();
        Some(task)
    }

    /// Snapshots of every known task, oldest first
    pub async fn list(&self) -> Vec<Task> {
        let entries: Vec<Arc<TaskEntry>> = {
            let mut tasks = self.tasks.write().await;
            self.evict_expired(&mut tasks);
            tasks.values().cloned().collect()
        };
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            tasks.push(entry.task.read().await.clone());
        }
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Request cooperative cancellation.
    ///
    /// A pending task is cancelled at once; a running one stops before its
    /// next stage.
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        let Some(entry) = self.lookup(task_id).await else {
            return CancelOutcome::NotFound;
        };

        // Check, cancel and conclude under one write lock
        let snapshot = {
            let mut task = entry.task.write().await;
            if task.status.is_terminal() {
                return CancelOutcome::AlreadyFinished;
            }
            tracing::info!(task_id, "cancellation requested");
            entry.cancel.cancel();
            if task.status == TaskStatus::Pending {
                self.finish_locked(&mut task, TaskStatus::Cancelled, Some(TaskError::cancelled()))
            } else {
                None
            }
        };
        if let Some(snapshot) = snapshot {
            self.settle(&entry, snapshot);
        }
        CancelOutcome::Requested
    }

    /// Wait until the task reaches a terminal state
    pub async fn wait(&self, task_id: &str) -> Option<Task> {
        let entry = self.lookup(task_id).await?;
        let mut status = entry.status.subscribe();
        while !status.borrow_and_update().is_terminal() {
            if status.changed().await.is_err() {
                break;
            }
        }
        let task = entry.task.read().await.clone();
        Some(task)
    }

    /// Publish an event for `task`. Called with the task's write lock held,
    /// so sequence order equals publish order.
    fn emit(
        &self,
        task: &mut Task,
        stage: Option<StageName>,
        status: EventStatus,
        progress: u8,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        task.advance_progress(progress);
        task.sequence += 1;
        let event = match stage {
            Some(stage) => ProgressEvent::stage(&task.id, task.sequence, stage, status, task.progress, message),
            None => ProgressEvent::pipeline(&task.id, task.sequence, status, task.progress, message),
        };
        let event = match data {
            Some(data) => event.with_data(data),
            None => event,
        };
        tracing::debug!(
            task_id = %task.id,
            sequence = event.sequence,
            stage = %event.stage_name,
            status = ?event.status,
            progress = event.progress,
            "progress event"
        );
        self.bus.publish(event);
    }

    /// Move a task to a terminal state, publish the pipeline-level outcome
    /// and hand the snapshot to the sink. No-op for finished tasks.
    async fn conclude(&self, entry: &TaskEntry, status: TaskStatus, error: Option<TaskError>) {
        let snapshot = {
            let mut task = entry.task.write().await;
            self.finish_locked(&mut task, status, error)
        };
        if let Some(snapshot) = snapshot {
            self.settle(entry, snapshot);
        }
    }

    /// Finish `task` and emit its pipeline-level event. Called with the
    /// task's write lock held; `None` if it had already finished.
    fn finish_locked(&self, task: &mut Task, status: TaskStatus, error: Option<TaskError>) -> Option<Task> {
        if task.status.is_terminal() {
            return None;
        }
        task.finish(status, error.clone());

        match status {
            TaskStatus::Completed => {
                let data = json!({
                    "outcome": "completed",
                    "total_stages": self.pipeline.len(),
                    "duration_ms": task.duration_ms(),
                });
                self.emit(task, None, EventStatus::Completed, 100, "Pipeline completed", Some(data));
            }
            _ => {
                let outcome = if status == TaskStatus::Cancelled { "cancelled" } else { "failed" };
                let message = error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| outcome.to_string());
                let data = json!({
                    "outcome": outcome,
                    "error_kind": error.as_ref().map(|e| e.kind),
                    "failed_stage": error.as_ref().and_then(|e| e.stage),
                });
                let progress = task.progress;
                self.emit(task, None, EventStatus::Failed, progress, message, Some(data));
            }
        }
        Some(task.clone())
    }

    /// Persist the final snapshot, close the event channel, then wake waiters
    fn settle(&self, entry: &TaskEntry, snapshot: Task) {
        tracing::info!(task_id = %snapshot.id, status = snapshot.status.as_str(), "task finished");
        if let Err(e) = self.sink.persist(&snapshot) {
            tracing::warn!(task_id = %snapshot.id, error = %e, "failed to persist task snapshot");
        }
        self.bus.close(&snapshot.id);
        if let Ok(mut finished_at) = entry.finished_at.lock() {
            *finished_at = Some(Instant::now());
        }
        entry.status.send_replace(snapshot.status);
    }

    async fn run_task(self: Arc<Self>, entry: Arc<TaskEntry>) {
        let _permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
            _ = entry.cancel.cancelled() => return,
        };

        let subject = {
            let mut task = entry.task.write().await;
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Running;
            task.started_at = Some(chrono::Utc::now());
            task.subject.clone()
        };
        entry.status.send_replace(TaskStatus::Running);

        for stage in self.pipeline.stages() {
            if entry.cancel.is_cancelled() {
                self.conclude(&entry, TaskStatus::Cancelled, Some(TaskError::cancelled()))
                    .await;
                return;
            }

            if let Err(error) = self.run_stage(&entry, stage, &subject).await {
                let status = if error.kind == TaskErrorKind::Cancelled {
                    TaskStatus::Cancelled
                } else {
                    TaskStatus::Failed
                };
                self.conclude(&entry, status, Some(error)).await;
                return;
            }
        }

        self.conclude(&entry, TaskStatus::Completed, None).await;
    }

    /// Run one stage. `Err` ends the task.
    #[tracing::instrument(skip_all, fields(stage = %stage.name))]
    async fn run_stage(&self, entry: &TaskEntry, stage: &StageDefinition, subject: &str) -> Result<(), TaskError> {
        let (task_id, context) = {
            let mut task = entry.task.write().await;
            if task.status.is_terminal() {
                return Err(TaskError::cancelled());
            }
            task.current_stage = Some(stage.name);
            if let Some(state) = task.stage_mut(stage.name) {
                state.status = StageStatus::Running;
            }
            self.emit(
                &mut task,
                Some(stage.name),
                EventStatus::Running,
                stage.checkpoint,
                format!("Starting {}", stage.name),
                None,
            );
            (task.id.clone(), task.context.clone())
        };

        let request = AgentRequest {
            task_id: &task_id,
            subject,
            context: &context,
            cancel: &entry.cancel,
        };
        let started = Instant::now();
        let invocation = AssertUnwindSafe(stage.agent.invoke(request)).catch_unwind();
        let outcome = match stage.deadline {
            Some(deadline) => tokio::time::timeout(deadline, invocation)
                .await
                .unwrap_or(Ok(Err(AgentError::DeadlineExceeded))),
            None => invocation.await,
        };
        let outcome = outcome.unwrap_or_else(|_| {
            Err(AgentError::fatal(TaskErrorKind::AgentFailure, "agent panicked"))
        });
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match outcome {
            Ok(output) if output.payload.stage() != stage.name => Err(AgentError::fatal(
                TaskErrorKind::AgentFailure,
                format!("agent returned a {} payload", output.payload.stage()),
            )),
            other => other,
        };

        let (payload, degraded) = match outcome {
            Ok(output) => (output.payload, output.degraded),
            Err(error) => {
                let fatal = error.is_cancellation()
                    || matches!(error, AgentError::Fatal { .. })
                    || stage.policy == FailurePolicy::Fatal;
                if fatal {
                    let task_error = task_error_for(stage.name, &error);
                    let mut task = entry.task.write().await;
                    if task.status.is_terminal() {
                        return Err(task_error);
                    }
                    if let Some(state) = task.stage_mut(stage.name) {
                        state.status = StageStatus::Failed;
                        state.duration_ms = Some(duration_ms);
                        state.error = Some(error.to_string());
                    }
                    let progress = task.progress;
                    self.emit(
                        &mut task,
                        Some(stage.name),
                        EventStatus::Failed,
                        progress,
                        format!("{} failed: {}", stage.name, error),
                        Some(json!({ "duration_ms": duration_ms, "error": error.to_string() })),
                    );
                    return Err(task_error);
                }
                tracing::warn!(error = %error, "stage degraded");
                (StagePayload::empty_for(stage.name), Some(error.to_string()))
            }
        };

        let mut task = entry.task.write().await;
        if task.status.is_terminal() {
            return Err(TaskError::cancelled());
        }
        let result = StageResult {
            stage: stage.name,
            success: degraded.is_none(),
            duration_ms,
            payload,
            degraded: degraded.clone(),
            error: None,
        };
        if let Err(e) = task.context.append(result) {
            return Err(TaskError::new(TaskErrorKind::AgentFailure, Some(stage.name), e.to_string()));
        }
        if let Some(state) = task.stage_mut(stage.name) {
            state.status = StageStatus::Completed;
            state.duration_ms = Some(duration_ms);
            state.degraded = degraded.clone();
        }
        let message = match &degraded {
            Some(_) => format!("{} completed with partial data", stage.name),
            None => format!("{} completed", stage.name),
        };
        self.emit(
            &mut task,
            Some(stage.name),
            EventStatus::Completed,
            stage.checkpoint,
            message,
            Some(json!({ "duration_ms": duration_ms, "degraded": degraded })),
        );
        Ok(())
    }
}

/// Terminal error for a fatal stage failure
fn task_error_for(stage: StageName, error: &AgentError) -> TaskError {
    let kind = match error {
        AgentError::Fatal { kind, .. } => *kind,
        e if e.is_cancellation() => TaskErrorKind::Cancelled,
        AgentError::Tool(_) => TaskErrorKind::ToolFailure,
        AgentError::Llm(_) => TaskErrorKind::AgentFailure,
        AgentError::DeadlineExceeded => TaskErrorKind::DeadlineExceeded,
        AgentError::Cancelled => TaskErrorKind::Cancelled,
    };
    let detail = match error {
        AgentError::Fatal { message, .. } => message.clone(),
        e if e.is_cancellation() => String::new(),
        other => format!("{} stage: {}", stage, other),
    };
    TaskError::new(kind, Some(stage), detail)
}
