//! # Task State
//!
//! Per-task state owned by the coordinator: overall status, per-stage
//! status and the append-only accumulated context.

use super::payload::{
    CompetitorReport, FinancialReport, ResearchReport, SectorReport, SentimentReport, StagePayload,
    TrendReport, ValidationReport,
};
use super::pipeline::{Pipeline, StageName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overall task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Status of one stage within a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never ran because the task ended first
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageState {
    pub name: StageName,
    pub status: StageStatus,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    /// Set when the stage completed with partial data
    pub degraded: Option<String>,
}

impl StageState {
    fn pending(name: StageName) -> Self {
        Self {
            name,
            status: StageStatus::Pending,
            duration_ms: None,
            error: None,
            degraded: None,
        }
    }
}

/// Output of one stage execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageName,
    pub success: bool,
    pub duration_ms: u64,
    pub payload: StagePayload,
    pub degraded: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("stage {0} already has a result")]
    Duplicate(StageName),
    #[error("payload for {payload} recorded under {stage}")]
    Mismatch { stage: StageName, payload: StageName },
}

/// Append-only, ordered mapping of stage to its result.
///
/// There is no API to remove or replace an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageContext {
    entries: Vec<StageResult>,
}

impl StageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: StageResult) -> Result<(), ContextError> {
        if result.payload.stage() != result.stage {
            return Err(ContextError::Mismatch {
                stage: result.stage,
                payload: result.payload.stage(),
            });
        }
        if self.get(result.stage).is_some() {
            return Err(ContextError::Duplicate(result.stage));
        }
        self.entries.push(result);
        Ok(())
    }

    pub fn get(&self, stage: StageName) -> Option<&StageResult> {
        self.entries.iter().find(|r| r.stage == stage)
    }

    pub fn entries(&self) -> &[StageResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stages(&self) -> Vec<StageName> {
        self.entries.iter().map(|r| r.stage).collect()
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        match self.get(StageName::Validation).map(|r| &r.payload) {
            Some(StagePayload::Validation(v)) => Some(v),
            _ => None,
        }
    }

    pub fn sector(&self) -> Option<&SectorReport> {
        match self.get(StageName::SectorIdentification).map(|r| &r.payload) {
            Some(StagePayload::SectorIdentification(v)) => Some(v),
            _ => None,
        }
    }

    pub fn competitors(&self) -> Option<&CompetitorReport> {
        match self.get(StageName::CompetitorDiscovery).map(|r| &r.payload) {
            Some(StagePayload::CompetitorDiscovery(v)) => Some(v),
            _ => None,
        }
    }

    pub fn financials(&self) -> Option<&FinancialReport> {
        match self.get(StageName::FinancialResearch).map(|r| &r.payload) {
            Some(StagePayload::FinancialResearch(v)) => Some(v),
            _ => None,
        }
    }

    pub fn research(&self) -> Option<&ResearchReport> {
        match self.get(StageName::DeepResearch).map(|r| &r.payload) {
            Some(StagePayload::DeepResearch(v)) => Some(v),
            _ => None,
        }
    }

    pub fn sentiment(&self) -> Option<&SentimentReport> {
        match self.get(StageName::SentimentAnalysis).map(|r| &r.payload) {
            Some(StagePayload::SentimentAnalysis(v)) => Some(v),
            _ => None,
        }
    }

    pub fn trends(&self) -> Option<&TrendReport> {
        match self.get(StageName::TrendAnalysis).map(|r| &r.payload) {
            Some(StagePayload::TrendAnalysis(v)) => Some(v),
            _ => None,
        }
    }

    /// Canonical company name if validation produced one, else `subject`
    pub fn company_name<'a>(&'a self, subject: &'a str) -> &'a str {
        self.validation()
            .map(|v| v.canonical_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(subject)
    }

    /// Identified sector, if any
    pub fn sector_name(&self) -> Option<&str> {
        self.sector()
            .map(|s| s.sector.as_str())
            .filter(|s| !s.is_empty() && *s != "Unknown")
    }
}

/// Why a task ended without completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// The subject could not be verified
    InputUnverified,
    /// A required tool call failed
    ToolFailure,
    /// The agent itself failed
    AgentFailure,
    DeadlineExceeded,
    Cancelled,
}

/// Terminal error carried by a failed or cancelled task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub stage: Option<StageName>,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, stage: Option<StageName>, detail: impl AsRef<str>) -> Self {
        let headline = match kind {
            TaskErrorKind::InputUnverified => "could not verify input",
            TaskErrorKind::ToolFailure => "internal tool failure",
            TaskErrorKind::AgentFailure => "agent failure",
            TaskErrorKind::DeadlineExceeded => "stage deadline exceeded",
            TaskErrorKind::Cancelled => "cancelled by request",
        };
        let detail = detail.as_ref();
        let message = if detail.is_empty() {
            headline.to_string()
        } else {
            format!("{}: {}", headline, detail)
        };
        Self { kind, stage, message }
    }

    pub fn cancelled() -> Self {
        Self::new(TaskErrorKind::Cancelled, None, "")
    }
}

/// A research task. Clones are snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    pub status: TaskStatus,
    pub current_stage: Option<StageName>,
    pub stages: Vec<StageState>,
    pub context: StageContext,
    /// 0 - 100, never decreases
    pub progress: u8,
    /// Sequence number of the last emitted progress event
    #[serde(default)]
    pub sequence: u64,
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, pipeline: &Pipeline) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            status: TaskStatus::Pending,
            current_stage: None,
            stages: pipeline
                .stages()
                .iter()
                .map(|s| StageState::pending(s.name))
                .collect(),
            context: StageContext::new(),
            progress: 0,
            sequence: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn stage_mut(&mut self, name: StageName) -> Option<&mut StageState> {
        self.stages.iter_mut().find(|s| s.name == name)
    }

    /// Raise progress; lower values are ignored
    pub fn advance_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }

    /// Mark every stage that has not run as skipped
    pub fn skip_remaining(&mut self) {
        for stage in &mut self.stages {
            if stage.status == StageStatus::Pending {
                stage.status = StageStatus::Skipped;
            }
        }
    }

    /// Move to a terminal status
    pub fn finish(&mut self, status: TaskStatus, error: Option<TaskError>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        if status == TaskStatus::Completed {
            self.advance_progress(100);
        } else {
            self.skip_remaining();
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        let start = self.started_at?;
        let end = self.completed_at?;
        Some((end - start).num_milliseconds())
    }

    /// The final report, once report generation has run
    pub fn report(&self) -> Option<&super::payload::FinalReport> {
        match self.context.get(StageName::ReportGeneration).map(|r| &r.payload) {
            Some(StagePayload::ReportGeneration(r)) => Some(r),
            _ => None,
        }
    }
}
