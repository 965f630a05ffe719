//! # Competitor Agent

use super::parse;
use super::prompts;
use super::{hits_of, render_hits, AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{Competitor, CompetitorReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;
use serde_json::Value;

/// Upper bound on competitors carried forward
const MAX_COMPETITORS: usize = 8;

pub struct CompetitorAgent {
    deps: AgentDeps,
}

impl CompetitorAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

fn competitor_from(value: &Value) -> Option<Competitor> {
    let competitor = match value {
        Value::String(name) => Competitor {
            name: name.trim().to_string(),
            ..Default::default()
        },
        Value::Object(_) => Competitor {
            name: parse::text(value, "name"),
            description: parse::text(value, "description"),
            estimated_market_share: parse::text(value, "estimated_market_share"),
            key_strengths: parse::strings(value, "key_strengths"),
        },
        _ => return None,
    };
    (!competitor.name.is_empty()).then_some(competitor)
}

#[async_trait]
impl StageAgent for CompetitorAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Competitor Agent",
            StageName::CompetitorDiscovery,
            "Discovers direct competitors and rates the competitive intensity of the market.",
        )
        .with_capabilities(&["competitor_discovery", "market_mapping"])
        .with_tools(&[ToolKind::WebSearch])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let sector = request.context.sector_name().unwrap_or("its industry");

        let queries = [
            format!("{} competitors", company),
            format!("{} alternatives {}", company, sector),
            format!("top companies in {}", sector),
        ];
        let output = self
            .deps
            .tools
            .call(&ToolCall::web_search(queries, 6), Requirement::BestEffort, request.cancel)
            .await?;
        let degraded = output.degraded.then(|| "competitor search unavailable".to_string());
        let hits = hits_of(&output.payload);

        let prompt = format!(
            "Company: {}\nSector: {}\n\nSearch results:\n{}",
            company,
            sector,
            render_hits(&hits, 15)
        );
        let reply = self
            .deps
            .llm
            .complete_json(prompts::COMPETITOR, &prompt)
            .await
            .map_err(AgentError::llm)?;

        let mut competitors: Vec<Competitor> = Vec::new();
        for candidate in parse::list(&reply, "competitors").iter().filter_map(competitor_from) {
            let duplicate = competitors
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&candidate.name));
            if !duplicate && !candidate.name.eq_ignore_ascii_case(company) {
                competitors.push(candidate);
            }
        }
        competitors.truncate(MAX_COMPETITORS);

        let report = CompetitorReport {
            total_market_players: parse::number(&reply, "total_market_players")
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(competitors.len() as u32),
            competitive_intensity: parse::opt_text(&reply, "competitive_intensity")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "medium".to_string()),
            competitors,
        };

        Ok(AgentOutput::complete(StagePayload::CompetitorDiscovery(report)).with_degraded(degraded))
    }
}
