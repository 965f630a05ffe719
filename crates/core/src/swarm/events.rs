//! # Progress Events
//!
//! Stage-transition events emitted by the coordinator. Transient: they are
//! published on the [`super::bus::EventBus`] and never stored.

use super::pipeline::StageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `stage_name` of pipeline-level events
pub const PIPELINE_STAGE: &str = "pipeline";

/// Transition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Running,
    Completed,
    Failed,
}

/// A progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub task_id: String,
    /// Per-task emission order, starting at 1
    pub sequence: u64,
    /// Stage name, or `"pipeline"` for the task-level outcome
    pub stage_name: String,
    pub status: EventStatus,
    /// 0 - 100, non-decreasing within a task
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn stage(
        task_id: &str,
        sequence: u64,
        stage: StageName,
        status: EventStatus,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            sequence,
            stage_name: stage.as_str().to_string(),
            status,
            progress,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn pipeline(
        task_id: &str,
        sequence: u64,
        status: EventStatus,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            sequence,
            stage_name: PIPELINE_STAGE.to_string(),
            status,
            progress,
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_pipeline_level(&self) -> bool {
        self.stage_name == PIPELINE_STAGE
    }

    /// The last event a task will ever emit
    pub fn is_terminal(&self) -> bool {
        self.is_pipeline_level() && self.status != EventStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pipeline_completion_is_distinguishable() {
        let stage = ProgressEvent::stage("t1", 16, StageName::ReportGeneration, EventStatus::Completed, 95, "done");
        let pipeline = ProgressEvent::pipeline("t1", 17, EventStatus::Completed, 100, "Pipeline completed")
            .with_data(json!({ "total_stages": 8 }));

        assert!(!stage.is_terminal());
        assert!(pipeline.is_terminal());

        let wire = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(wire["stage_name"], "pipeline");
        assert_eq!(wire["status"], "completed");
        assert_eq!(wire["data"]["total_stages"], 8);
    }
}
