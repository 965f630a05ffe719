//! # Stage Agents
//!
//! Every pipeline stage delegates to an agent implementing [`StageAgent`].
//! Agents combine Tool-Call Layer invocations with a language-model call
//! and return the stage's typed payload.
//!
//! ## Agents
//!
//! - `ValidationAgent` - Is the subject a real company?
//! - `SectorAgent` - Industry classification
//! - `CompetitorAgent` - Competitor discovery
//! - `FinancialAgent` - Financial figures and comparison
//! - `ResearchAgent` - Page-level web research
//! - `SentimentAgent` - News sentiment
//! - `TrendAgent` - Trends, opportunities and threats
//! - `ReportAgent` - Final report synthesis

pub mod competitor;
pub mod financial;
pub mod parse;
pub mod prompts;
pub mod report;
pub mod research;
pub mod sector;
pub mod sentiment;
pub mod trend;
pub mod validation;

pub use competitor::CompetitorAgent;
pub use financial::FinancialAgent;
pub use report::ReportAgent;
pub use research::ResearchAgent;
pub use sector::SectorAgent;
pub use sentiment::SentimentAgent;
pub use trend::TrendAgent;
pub use validation::ValidationAgent;

use crate::llm::LanguageModel;
use crate::swarm::payload::StagePayload;
use crate::swarm::pipeline::StageName;
use crate::swarm::task::{StageContext, TaskErrorKind};
use crate::tools::{SearchHit, ToolError, ToolExecutor, ToolKind};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Self-description of an agent, listable by clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCard {
    pub name: String,
    pub stage: StageName,
    pub description: String,
    pub capabilities: Vec<String>,
    pub tools: Vec<ToolKind>,
}

impl AgentCard {
    pub fn new(name: &str, stage: StageName, description: &str) -> Self {
        Self {
            name: name.to_string(),
            stage,
            description: description.to_string(),
            capabilities: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = capabilities.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_tools(mut self, tools: &[ToolKind]) -> Self {
        self.tools = tools.to_vec();
        self
    }
}

/// Input handed to an agent
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub task_id: &'a str,
    pub subject: &'a str,
    /// Results of every earlier stage
    pub context: &'a StageContext,
    /// Checked before every tool call
    pub cancel: &'a CancellationToken,
}

/// Successful agent output
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub payload: StagePayload,
    /// Why the payload is partial, if it is
    pub degraded: Option<String>,
}

impl AgentOutput {
    pub fn complete(payload: StagePayload) -> Self {
        Self {
            payload,
            degraded: None,
        }
    }

    pub fn degraded(payload: StagePayload, reason: impl Into<String>) -> Self {
        Self {
            payload,
            degraded: Some(reason.into()),
        }
    }

    /// Mark degraded when `reason` is set
    pub fn with_degraded(mut self, reason: Option<String>) -> Self {
        self.degraded = reason;
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The agent declares its missing data non-recoverable
    #[error("{message}")]
    Fatal { kind: TaskErrorKind, message: String },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("language model: {0}")]
    Llm(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn fatal(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        AgentError::Fatal {
            kind,
            message: message.into(),
        }
    }

    pub fn llm(error: anyhow::Error) -> Self {
        AgentError::Llm(format!("{:#}", error))
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, AgentError::Cancelled | AgentError::Tool(ToolError::Cancelled))
    }
}

/// The capability every stage delegates to
#[async_trait]
pub trait StageAgent: Send + Sync {
    fn card(&self) -> AgentCard;

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError>;
}

/// Shared collaborators of the standard agents
#[derive(Clone)]
pub struct AgentDeps {
    pub tools: Arc<ToolExecutor>,
    pub llm: Arc<dyn LanguageModel>,
}

impl AgentDeps {
    pub fn new(tools: Arc<ToolExecutor>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { tools, llm }
    }
}

/// The eight standard agents, in stage order
pub fn standard_agents(deps: &AgentDeps) -> Vec<Arc<dyn StageAgent>> {
    vec![
        Arc::new(ValidationAgent::new(deps.clone())),
        Arc::new(SectorAgent::new(deps.clone())),
        Arc::new(CompetitorAgent::new(deps.clone())),
        Arc::new(FinancialAgent::new(deps.clone())),
        Arc::new(ResearchAgent::new(deps.clone())),
        Arc::new(SentimentAgent::new(deps.clone())),
        Arc::new(TrendAgent::new(deps.clone())),
        Arc::new(ReportAgent::new(deps.clone())),
    ]
}

/// Hits from a `web_search` payload
pub(crate) fn hits_of(payload: &serde_json::Value) -> Vec<SearchHit> {
    payload
        .get("hits")
        .cloned()
        .and_then(|h| serde_json::from_value(h).ok())
        .unwrap_or_default()
}

/// Compact, prompt-friendly rendering of search hits
pub(crate) fn render_hits(hits: &[SearchHit], limit: usize) -> String {
    if hits.is_empty() {
        return "(no search results available)".to_string();
    }
    hits.iter()
        .take(limit)
        .map(|h| format!("- {} ({})\n  {}", h.title, h.url, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the agent tests

    use crate::llm::LanguageModel;
    use crate::tools::{PageFetcher, ProviderError, SearchHit, SearchProvider, ToolConfig, ToolExecutor};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    use super::AgentDeps;

    pub struct FixedSearch(pub Vec<SearchHit>);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn query(&self, _text: &str, max: usize) -> Result<Vec<SearchHit>, ProviderError> {
            if self.0.is_empty() {
                return Err(ProviderError::Empty);
            }
            Ok(self.0.iter().take(max).cloned().collect())
        }
    }

    pub struct FixedPage(pub String);

    #[async_trait]
    impl PageFetcher for FixedPage {
        async fn fetch(&self, _url: &str) -> Result<String, ProviderError> {
            Ok(self.0.clone())
        }
    }

    /// Returns a canned reply (or failure) and records the prompts it saw
    pub struct ScriptedModel {
        pub reply: Option<Value>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn replying(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete_json(&self, _system: &str, prompt: &str) -> anyhow::Result<Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("model unavailable"))
        }
    }

    pub fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
        }
    }

    pub fn deps(hits: Vec<SearchHit>, model: Arc<ScriptedModel>) -> AgentDeps {
        let config = ToolConfig {
            inter_query_delay_ms: 0,
            ..ToolConfig::default()
        };
        let tools = ToolExecutor::new(
            Arc::new(FixedSearch(hits)),
            Arc::new(FixedPage(
                "<html><body><p>Acme sells anvils and rockets to coyotes across the desert.</p></body></html>"
                    .to_string(),
            )),
            config,
        );
        AgentDeps::new(Arc::new(tools), model)
    }
}
