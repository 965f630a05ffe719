//! # Pipeline Stages
//!
//! The fixed, ordered stage list and its per-stage failure policy.

use crate::agents::StageAgent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Stage of the research pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Is the subject a real company?
    Validation,
    /// Which industry does it belong to?
    SectorIdentification,
    /// Who competes with it?
    CompetitorDiscovery,
    /// Financial figures for it and its competitors
    FinancialResearch,
    /// Web research on products, pricing and market
    DeepResearch,
    /// News sentiment
    SentimentAnalysis,
    /// Industry trends, opportunities and threats
    TrendAnalysis,
    /// Final synthesized report
    ReportGeneration,
}

impl StageName {
    pub const ALL: [StageName; 8] = [
        StageName::Validation,
        StageName::SectorIdentification,
        StageName::CompetitorDiscovery,
        StageName::FinancialResearch,
        StageName::DeepResearch,
        StageName::SentimentAnalysis,
        StageName::TrendAnalysis,
        StageName::ReportGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Validation => "validation",
            StageName::SectorIdentification => "sector_identification",
            StageName::CompetitorDiscovery => "competitor_discovery",
            StageName::FinancialResearch => "financial_research",
            StageName::DeepResearch => "deep_research",
            StageName::SentimentAnalysis => "sentiment_analysis",
            StageName::TrendAnalysis => "trend_analysis",
            StageName::ReportGeneration => "report_generation",
        }
    }

    /// Declared progress percentage reached when this stage runs
    pub fn checkpoint(&self) -> u8 {
        match self {
            StageName::Validation => 10,
            StageName::SectorIdentification => 20,
            StageName::CompetitorDiscovery => 35,
            StageName::FinancialResearch => 50,
            StageName::DeepResearch => 65,
            StageName::SentimentAnalysis => 75,
            StageName::TrendAnalysis => 85,
            StageName::ReportGeneration => 95,
        }
    }

    /// Which failures end the task
    pub fn default_policy(&self) -> FailurePolicy {
        match self {
            StageName::Validation | StageName::ReportGeneration => FailurePolicy::Fatal,
            _ => FailurePolicy::Degrade,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage failure means for the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any error ends the task
    Fatal,
    /// Errors are recorded; the stage contributes an empty payload
    Degrade,
}

/// Immutable configuration of one stage
#[derive(Clone)]
pub struct StageDefinition {
    pub name: StageName,
    pub checkpoint: u8,
    pub policy: FailurePolicy,
    /// Overall budget for the agent invocation
    pub deadline: Option<Duration>,
    pub agent: Arc<dyn StageAgent>,
}

impl StageDefinition {
    pub fn new(name: StageName, agent: Arc<dyn StageAgent>) -> Self {
        Self {
            name,
            checkpoint: name.checkpoint(),
            policy: name.default_policy(),
            deadline: None,
            agent,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl std::fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .field("checkpoint", &self.checkpoint)
            .field("policy", &self.policy)
            .field("deadline", &self.deadline)
            .field("agent", &self.agent.card().name)
            .finish()
    }
}

/// Ordered stage list
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<StageDefinition>,
}

impl Pipeline {
    /// Build a pipeline.
    ///
    /// Stages must be distinct, in execution order, and carry
    /// non-decreasing checkpoints.
    pub fn new(stages: Vec<StageDefinition>) -> anyhow::Result<Self> {
        for pair in stages.windows(2) {
            if pair[1].name <= pair[0].name {
                anyhow::bail!("stage {} cannot follow {}", pair[1].name, pair[0].name);
            }
            if pair[1].checkpoint < pair[0].checkpoint {
                anyhow::bail!("checkpoint of {} goes backwards", pair[1].name);
            }
        }
        if stages.iter().any(|s| s.checkpoint > 100) {
            anyhow::bail!("checkpoints must be percentages");
        }
        Ok(Self { stages })
    }

    /// One agent per stage, all eight stages with their default policies
    pub fn standard(agents: Vec<Arc<dyn StageAgent>>, deadline: Option<Duration>) -> anyhow::Result<Self> {
        if agents.len() != StageName::ALL.len() {
            anyhow::bail!("expected {} agents, got {}", StageName::ALL.len(), agents.len());
        }
        let stages = StageName::ALL
            .into_iter()
            .zip(agents)
            .map(|(name, agent)| {
                let stage = StageDefinition::new(name, agent);
                match deadline {
                    Some(d) => stage.with_deadline(d),
                    None => stage,
                }
            })
            .collect();
        Self::new(stages)
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_increase() {
        let checkpoints: Vec<u8> = StageName::ALL.iter().map(|s| s.checkpoint()).collect();
        assert_eq!(checkpoints, vec![10, 20, 35, 50, 65, 75, 85, 95]);
    }

    #[test]
    fn test_policy_table() {
        let fatal: Vec<StageName> = StageName::ALL
            .into_iter()
            .filter(|s| s.default_policy() == FailurePolicy::Fatal)
            .collect();
        assert_eq!(fatal, vec![StageName::Validation, StageName::ReportGeneration]);
    }

    #[test]
    fn test_stage_name_serialization() {
        let json = serde_json::to_string(&StageName::SectorIdentification).unwrap();
        assert_eq!(json, "\"sector_identification\"");
        assert_eq!(StageName::DeepResearch.to_string(), "deep_research");
    }
}
