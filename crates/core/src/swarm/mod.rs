//! # Pipeline Orchestration
//!
//! Drives research tasks through the fixed stage sequence.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Validation → Sector → Competitors → Financials → Deep Research
//!            → Sentiment → Trends → Report
//! ```
//!
//! Every stage transition is published on the [`EventBus`]; the final task
//! snapshot goes to a [`SnapshotSink`].

pub mod bus;
pub mod coordinator;
pub mod events;
pub mod payload;
pub mod pipeline;
pub mod store;
pub mod task;

pub use bus::EventBus;
pub use coordinator::{CancelOutcome, Coordinator, CoordinatorConfig, CoordinatorError};
pub use events::{EventStatus, ProgressEvent, PIPELINE_STAGE};
pub use payload::{FinalReport, StagePayload};
pub use pipeline::{FailurePolicy, Pipeline, StageDefinition, StageName};
pub use store::{NoopSink, SnapshotSink, SqliteSnapshotStore};
pub use task::{
    StageContext, StageResult, StageState, StageStatus, Task, TaskError, TaskErrorKind, TaskStatus,
};
