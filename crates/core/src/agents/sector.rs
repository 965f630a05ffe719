//! # Sector Agent
//!
//! Classifies the company by industry: search keyword votes first, then the
//! model's reading of them.

use super::parse;
use super::prompts;
use super::{AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{SectorReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::tools::analysis::SectorVotes;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;

pub struct SectorAgent {
    deps: AgentDeps,
}

impl SectorAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for SectorAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Sector Agent",
            StageName::SectorIdentification,
            "Identifies the primary sector, sub-sectors and industry codes of the company.",
        )
        .with_capabilities(&["sector_classification", "industry_codes"])
        .with_tools(&[ToolKind::IdentifySector])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);

        let output = self
            .deps
            .tools
            .call(&ToolCall::identify_sector(company), Requirement::BestEffort, request.cancel)
            .await?;
        let degraded = output.degraded.then(|| "sector search unavailable".to_string());
        let votes: SectorVotes = serde_json::from_value(output.payload).unwrap_or_default();

        let prompt = format!(
            "Company: {}\nKeyword votes: {}\nLeading sector by votes: {} ({} confidence)",
            company,
            serde_json::to_string(&votes.votes).unwrap_or_default(),
            if votes.sector.is_empty() { "Unknown" } else { &votes.sector },
            if votes.confidence.is_empty() { "low" } else { &votes.confidence },
        );
        let reply = self
            .deps
            .llm
            .complete_json(prompts::SECTOR, &prompt)
            .await
            .map_err(AgentError::llm)?;

        let report = SectorReport {
            sector: parse::opt_text(&reply, "sector")
                .or_else(|| Some(votes.sector.clone()).filter(|s| !s.is_empty()))
                .unwrap_or_else(|| "Unknown".to_string()),
            sub_sectors: parse::strings(&reply, "sub_sectors"),
            sic_code: parse::opt_text(&reply, "sic_code"),
            naics_code: parse::opt_text(&reply, "naics_code"),
            confidence: parse::confidence(&reply, "confidence")
                .or_else(|| parse::label_confidence(&votes.confidence))
                .unwrap_or(0.5),
            reasoning: parse::text(&reply, "reasoning"),
            votes: votes.votes,
        };

        Ok(AgentOutput::complete(StagePayload::SectorIdentification(report)).with_degraded(degraded))
    }
}
