//! # Financial Agent

use super::parse;
use super::prompts;
use super::{hits_of, render_hits, AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{FinancialReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;

/// Competitors whose figures are searched for
const COMPETITOR_LOOKUPS: usize = 3;

pub struct FinancialAgent {
    deps: AgentDeps,
}

impl FinancialAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for FinancialAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Financial Agent",
            StageName::FinancialResearch,
            "Gathers revenue, growth and valuation figures and compares them with competitors.",
        )
        .with_capabilities(&["financial_research", "financial_comparison", "health_scoring"])
        .with_tools(&[ToolKind::WebSearch])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let competitors: Vec<&str> = request
            .context
            .competitors()
            .map(|c| c.names())
            .unwrap_or_default();

        let mut queries = vec![
            format!("{} annual revenue", company),
            format!("{} market cap valuation", company),
        ];
        queries.extend(
            competitors
                .iter()
                .take(COMPETITOR_LOOKUPS)
                .map(|c| format!("{} annual revenue", c)),
        );

        let output = self
            .deps
            .tools
            .call(&ToolCall::web_search(queries, 5), Requirement::BestEffort, request.cancel)
            .await?;
        let degraded = output.degraded.then(|| "financial search unavailable".to_string());
        let hits = hits_of(&output.payload);

        let prompt = format!(
            "Company: {}\nCompetitors: {}\n\nSearch results:\n{}",
            company,
            if competitors.is_empty() { "(none identified)".to_string() } else { competitors.join(", ") },
            render_hits(&hits, 20)
        );
        let reply = self
            .deps
            .llm
            .complete_json(prompts::FINANCIAL, &prompt)
            .await
            .map_err(AgentError::llm)?;

        let report = FinancialReport {
            company_financials: parse::object(&reply, "company_financials"),
            competitor_financials: parse::list(&reply, "competitor_financials"),
            financial_comparison: parse::text(&reply, "financial_comparison"),
            financial_health_score: parse::number(&reply, "financial_health_score")
                .map(|s| s.clamp(0.0, 10.0))
                .unwrap_or(0.0),
            sources: hits.iter().map(|h| h.url.clone()).filter(|u| !u.is_empty()).collect(),
        };

        Ok(AgentOutput::complete(StagePayload::FinancialResearch(report)).with_degraded(degraded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, hit, ScriptedModel};
    use crate::swarm::payload::{Competitor, CompetitorReport, StagePayload};
    use crate::swarm::task::{StageContext, StageResult};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_prompt_includes_competitors_and_score_is_clamped() {
        let mut context = StageContext::new();
        context
            .append(StageResult {
                stage: StageName::CompetitorDiscovery,
                success: true,
                duration_ms: 1,
                payload: StagePayload::CompetitorDiscovery(CompetitorReport {
                    competitors: vec![Competitor {
                        name: "Globex".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                degraded: None,
                error: None,
            })
            .unwrap();

        let model = ScriptedModel::replying(json!({
            "company_financials": { "revenue": "$1B" },
            "financial_health_score": 14
        }));
        let hits = vec![hit("Acme revenue 2024", "https://finance.example/acme", "$1B")];
        let agent = FinancialAgent::new(deps(hits, model.clone()));
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap();
        let StagePayload::FinancialResearch(report) = output.payload else {
            panic!("wrong payload");
        };
        assert_eq!(report.company_financials["revenue"], "$1B");
        assert_eq!(report.financial_health_score, 10.0);
        assert_eq!(report.sources, vec!["https://finance.example/acme"]);
        assert!(model.prompts.lock().unwrap()[0].contains("Competitors: Globex"));
    }
}
