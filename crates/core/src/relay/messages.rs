//! Wire messages exchanged with observers.
//!
//! Every message is a flat JSON object carrying `type` and `task_id`.

use crate::swarm::events::{EventStatus, ProgressEvent};
use crate::swarm::pipeline::StageName;
use crate::swarm::task::{StageState, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Snapshot sent on attach and after every resync
    InitialState {
        task_id: String,
        subject: String,
        status: TaskStatus,
        stage: Option<StageName>,
        progress: u8,
        sequence: u64,
        stages: Vec<StageState>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Progress {
        task_id: String,
        sequence: u64,
        stage_name: String,
        status: EventStatus,
        progress: u8,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        timestamp: DateTime<Utc>,
    },
    /// Pipeline-level outcome. The last message of a task.
    Completion {
        task_id: String,
        /// `completed`, `failed` or `cancelled`
        outcome: String,
        progress: u8,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        task_id: String,
        message: String,
        recoverable: bool,
    },
    /// Upstream frame that is not a progress event, passed through verbatim
    Raw { task_id: String, payload: String },
    Keepalive { task_id: String, timestamp: DateTime<Utc> },
    Pong { task_id: String, timestamp: DateTime<Utc> },
}

impl ObserverMessage {
    pub fn initial_state(task: &Task) -> Self {
        ObserverMessage::InitialState {
            task_id: task.id.clone(),
            subject: task.subject.clone(),
            status: task.status,
            stage: task.current_stage,
            progress: task.progress,
            sequence: task.sequence,
            stages: task.stages.clone(),
            error: task.error.as_ref().map(|e| e.message.clone()),
        }
    }

    /// Completion message for a task that already finished
    pub fn completion_from(task: &Task) -> Self {
        ObserverMessage::Completion {
            task_id: task.id.clone(),
            outcome: task.status.as_str().to_string(),
            progress: task.progress,
            message: match &task.error {
                Some(e) => e.message.clone(),
                None => "Pipeline completed".to_string(),
            },
            data: None,
        }
    }

    /// Map a progress event to its observer message
    pub fn from_event(event: ProgressEvent) -> Self {
        if event.is_terminal() {
            let outcome = event
                .data
                .as_ref()
                .and_then(|d| d.get("outcome"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| match event.status {
                    EventStatus::Completed => "completed".to_string(),
                    _ => "failed".to_string(),
                });
            return ObserverMessage::Completion {
                task_id: event.task_id,
                outcome,
                progress: event.progress,
                message: event.message,
                data: event.data,
            };
        }
        ObserverMessage::Progress {
            task_id: event.task_id,
            sequence: event.sequence,
            stage_name: event.stage_name,
            status: event.status,
            progress: event.progress,
            message: event.message,
            data: event.data,
            timestamp: event.timestamp,
        }
    }

    pub fn error(task_id: &str, message: impl Into<String>, recoverable: bool) -> Self {
        ObserverMessage::Error {
            task_id: task_id.to_string(),
            message: message.into(),
            recoverable,
        }
    }

    pub fn keepalive(task_id: &str) -> Self {
        ObserverMessage::Keepalive {
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong(task_id: &str) -> Self {
        ObserverMessage::Pong {
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, ObserverMessage::Completion { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","task_id":"","message":"{}","recoverable":true}}"#, e)
        })
    }
}

/// Observer → server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    #[serde(other)]
    Other,
}

/// Reply to a raw client frame. Plain `ping` is accepted as well as
/// `{"type":"ping"}`; unknown message types are ignored.
pub fn reply_to(task_id: &str, text: &str) -> Option<ObserverMessage> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("ping") {
        return Some(ObserverMessage::pong(task_id));
    }
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => Some(ObserverMessage::pong(task_id)),
        Ok(ClientMessage::Other) => None,
        Err(e) => Some(ObserverMessage::error(task_id, format!("invalid message: {}", e), true)),
    }
}
