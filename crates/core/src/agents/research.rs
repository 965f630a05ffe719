//! # Research Agent
//!
//! Page-level research: for the company and its leading competitors, find
//! relevant pages, extract the text that matters and have the model
//! structure it. Finishes with a market-level overview.

use super::prompts;
use super::{hits_of, AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{ResearchReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Competitors researched besides the company itself
const MAX_COMPETITORS: usize = 3;
/// Pages read per entity
const PAGES_PER_ENTITY: usize = 2;
/// Characters of page text handed to the model per entity
const ENTITY_TEXT_BUDGET: usize = 6000;

pub struct ResearchAgent {
    deps: AgentDeps,
}

struct EntityResearch {
    summary: Value,
    pages_read: usize,
    degraded: bool,
}

impl ResearchAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    async fn research_entity(
        &self,
        entity: &str,
        sector: &str,
        cancel: &CancellationToken,
    ) -> Result<EntityResearch, AgentError> {
        let search = self
            .deps
            .tools
            .call(
                &ToolCall::web_search([format!("{} {} company overview products pricing", entity, sector)], 5),
                Requirement::BestEffort,
                cancel,
            )
            .await?;
        let mut degraded = search.degraded;

        let instructions = format!("{} products pricing market position news", entity);
        let mut text = String::new();
        let mut pages_read = 0;
        for hit in hits_of(&search.payload).iter().filter(|h| !h.url.is_empty()).take(PAGES_PER_ENTITY) {
            let page = self
                .deps
                .tools
                .call(&ToolCall::fetch_page(&hit.url, &instructions), Requirement::BestEffort, cancel)
                .await?;
            if page.degraded {
                degraded = true;
                continue;
            }
            pages_read += 1;
            let content = page.payload.get("content").and_then(|c| c.as_str()).unwrap_or("");
            text.push_str(&format!("--- {} ---\n{}\n\n", hit.url, content));
        }
        let text: String = text.chars().take(ENTITY_TEXT_BUDGET).collect();

        let prompt = format!(
            "Company: {} (sector: {})\n\n{}",
            entity,
            sector,
            if text.is_empty() { "(no page content could be retrieved)" } else { &text }
        );
        let summary = self
            .deps
            .llm
            .complete_json(prompts::RESEARCH_ENTITY, &prompt)
            .await
            .map_err(AgentError::llm)?;

        Ok(EntityResearch {
            summary,
            pages_read,
            degraded,
        })
    }
}

#[async_trait]
impl StageAgent for ResearchAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Research Agent",
            StageName::DeepResearch,
            "Reads web pages about the company and its competitors and summarizes products, pricing and positioning.",
        )
        .with_capabilities(&["web_research", "pricing_analysis", "product_research", "market_positioning"])
        .with_tools(&[ToolKind::WebSearch, ToolKind::FetchPage])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let sector = request.context.sector_name().unwrap_or("Unknown");
        let competitors: Vec<&str> = request
            .context
            .competitors()
            .map(|c| c.names())
            .unwrap_or_default();

        let main = self.research_entity(company, sector, request.cancel).await?;
        let mut pages_read = main.pages_read;
        let mut degraded = main.degraded;

        let mut competitor_data = BTreeMap::new();
        for name in competitors.iter().take(MAX_COMPETITORS) {
            if request.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            // One unreachable competitor should not sink the whole stage
            match self.research_entity(name, sector, request.cancel).await {
                Ok(found) => {
                    pages_read += found.pages_read;
                    degraded |= found.degraded;
                    competitor_data.insert(name.to_string(), found.summary);
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    tracing::warn!(competitor = %name, error = %e, "competitor research failed");
                    degraded = true;
                }
            }
        }

        let market_prompt = format!(
            "Sector: {}\nTarget company: {}\nCompetitors: {}",
            sector,
            company,
            competitors.iter().take(MAX_COMPETITORS).copied().collect::<Vec<_>>().join(", ")
        );
        let market_data = self
            .deps
            .llm
            .complete_json(prompts::RESEARCH_MARKET, &market_prompt)
            .await
            .map_err(AgentError::llm)?;

        let report = ResearchReport {
            company_data: main.summary,
            competitor_data,
            market_data,
            pages_read,
        };
        let degraded = degraded.then(|| "some pages or searches were unavailable".to_string());
        Ok(AgentOutput::complete(StagePayload::DeepResearch(report)).with_degraded(degraded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, hit, ScriptedModel};
    use crate::swarm::task::StageContext;
    use serde_json::json;

    #[tokio::test]
    async fn test_reads_pages_and_summarizes() {
        let model = ScriptedModel::replying(json!({ "overview": "Anvil maker", "market_size": "$2B" }));
        let hits = vec![
            hit("Acme products", "https://acme.com/products", "anvils"),
            hit("Acme pricing", "https://acme.com/pricing", "rockets"),
        ];
        let agent = ResearchAgent::new(deps(hits, model.clone()));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap();
        let StagePayload::DeepResearch(report) = output.payload else {
            panic!("wrong payload");
        };
        assert_eq!(report.pages_read, 2);
        assert_eq!(report.company_data["overview"], "Anvil maker");
        assert!(report.competitor_data.is_empty());
        assert!(output.degraded.is_none());

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Acme sells anvils"));
    }
}
