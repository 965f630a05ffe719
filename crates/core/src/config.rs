//! # Runtime Configuration
//!
//! One serde document for every tunable part of the runtime. Sections left
//! out of a JSON file fall back to their defaults.

use crate::agents::{standard_agents, AgentDeps};
use crate::llm::LanguageModel;
use crate::models::ModelConfig;
use crate::relay::RelayConfig;
use crate::swarm::{Coordinator, CoordinatorConfig, Pipeline, SnapshotSink};
use crate::tools::{HttpFetcher, SearxngSearch, ToolConfig, ToolExecutor};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub coordinator: CoordinatorConfig,
    pub tools: ToolConfig,
    pub relay: RelayConfig,
    pub model: ModelConfig,
}

impl ScoutConfig {
    /// Coordinator running the standard agents over the HTTP providers
    pub fn build_coordinator(
        &self,
        llm: Arc<dyn LanguageModel>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<Arc<Coordinator>> {
        let timeout = self.tools.call_timeout();
        let endpoints = SearxngSearch::default_endpoints(self.tools.searxng_url.as_deref());
        let search = SearxngSearch::new(endpoints, timeout).context("Failed to build search client")?;
        let fetcher = HttpFetcher::new(timeout).context("Failed to build page fetcher")?;

        let tools = Arc::new(ToolExecutor::new(Arc::new(search), Arc::new(fetcher), self.tools.clone()));
        let agents = standard_agents(&AgentDeps::new(tools, llm));
        let pipeline = Pipeline::standard(agents, self.coordinator.stage_deadline())?;

        tracing::debug!(
            stages = pipeline.len(),
            max_concurrent = self.coordinator.max_concurrent_tasks,
            model = %self.model.model,
            "coordinator assembled"
        );
        Ok(Coordinator::new(pipeline, self.coordinator.clone(), sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedModel;
    use crate::swarm::NoopSink;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: ScoutConfig = serde_json::from_str(
            r#"{ "coordinator": { "max_concurrent_tasks": 2 }, "model": { "model": "deepseek-chat" } }"#,
        )
        .unwrap();
        assert_eq!(config.coordinator.max_concurrent_tasks, 2);
        assert_eq!(config.coordinator.stage_deadline_secs, 300);
        assert_eq!(config.tools.cache_ttl_secs, 3600);
        assert_eq!(config.relay.keepalive_interval_secs, 30);
        assert_eq!(config.model.model, "deepseek-chat");
    }

    #[tokio::test]
    async fn test_build_coordinator_has_all_stages() {
        let config = ScoutConfig::default();
        let coordinator = config
            .build_coordinator(ScriptedModel::failing(), Arc::new(NoopSink))
            .unwrap();
        let cards = coordinator.agent_cards();
        assert_eq!(cards.len(), 8);
        assert_eq!(cards[0].name, "Validation Agent");
        assert!(coordinator.list().await.is_empty());
    }
}
