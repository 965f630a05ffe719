//! # Trend Agent

use super::parse;
use super::prompts;
use super::{hits_of, render_hits, AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{StagePayload, TrendReport};
use crate::swarm::pipeline::StageName;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;

pub struct TrendAgent {
    deps: AgentDeps,
}

impl TrendAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for TrendAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Trend Agent",
            StageName::TrendAnalysis,
            "Identifies emerging and declining trends, opportunities and threats in the company's sector.",
        )
        .with_capabilities(&["trend_analysis", "opportunity_mapping", "threat_assessment"])
        .with_tools(&[ToolKind::WebSearch])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let sector = request.context.sector_name().unwrap_or("its industry");

        let queries = [
            format!("{} industry trends", sector),
            format!("{} market outlook", sector),
            format!("{} future strategy", company),
        ];
        let output = self
            .deps
            .tools
            .call(&ToolCall::web_search(queries, 5), Requirement::BestEffort, request.cancel)
            .await?;
        let degraded = output.degraded.then(|| "trend search unavailable".to_string());

        let mut prompt = format!(
            "Sector: {}\nCompany: {}\n\nSearch results:\n{}",
            sector,
            company,
            render_hits(&hits_of(&output.payload), 15)
        );
        if let Some(market) = request.context.research().map(|r| &r.market_data) {
            if !market.is_null() {
                prompt.push_str(&format!("\n\nEarlier market research:\n{}", market));
            }
        }

        let reply = self
            .deps
            .llm
            .complete_json(prompts::TREND, &prompt)
            .await
            .map_err(AgentError::llm)?;

        let report = TrendReport {
            emerging_trends: parse::list(&reply, "emerging_trends"),
            declining_trends: parse::list(&reply, "declining_trends"),
            opportunities: parse::list(&reply, "opportunities"),
            threats: parse::list(&reply, "threats"),
            market_outlook: parse::text(&reply, "market_outlook"),
            five_year_forecast: parse::text(&reply, "five_year_forecast"),
        };

        Ok(AgentOutput::complete(StagePayload::TrendAnalysis(report)).with_degraded(degraded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, hit, ScriptedModel};
    use crate::swarm::task::StageContext;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_single_objects_become_lists() {
        let model = ScriptedModel::replying(json!({
            "emerging_trends": { "trend": "AI everywhere", "impact": "high" },
            "threats": [{ "threat": "Regulation" }, { "threat": "Price war" }],
            "market_outlook": "Positive"
        }));
        let agent = TrendAgent::new(deps(vec![hit("Trends", "https://t.example", "AI")], model));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap();
        let StagePayload::TrendAnalysis(report) = output.payload else {
            panic!("wrong payload");
        };
        assert_eq!(report.emerging_trends.len(), 1);
        assert_eq!(report.threats.len(), 2);
        assert!(report.declining_trends.is_empty());
        assert_eq!(report.market_outlook, "Positive");
    }
}
