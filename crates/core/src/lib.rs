//! # Scout Core
//!
//! Runtime for multi-stage company research: the tool-call layer, the
//! pipeline coordinator and the progress relay.
//!
//! ## Architecture
//!
//! - `tools/` - Cached, retried web search and page fetch plus heuristics
//! - `agents/` - One agent per pipeline stage
//! - `swarm/` - Task state machine, stage loop, events and snapshots
//! - `relay/` - Fan-out of progress events to remote observers
//! - `models/` - LLM provider configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scout_core::{ScoutConfig, llm::ChatCompletionsModel, swarm::NoopSink};
//!
//! let config = ScoutConfig::default();
//! let llm = Arc::new(ChatCompletionsModel::from_env(config.model.clone())?);
//! let coordinator = config.build_coordinator(llm, Arc::new(NoopSink))?;
//! let task_id = coordinator.start("Acme Corp").await?;
//! let task = coordinator.wait(&task_id).await;
//! ```

pub mod agents;
pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod swarm;
pub mod tools;

pub use config::ScoutConfig;
