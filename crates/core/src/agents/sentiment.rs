//! # Sentiment Agent
//!
//! The score comes from headline classification, the model only adds the
//! narrative. Losing the model degrades the stage instead of failing it.

use super::parse;
use super::prompts;
use super::{AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{SentimentReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::tools::analysis::SentimentSummary;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;

pub struct SentimentAgent {
    deps: AgentDeps,
}

impl SentimentAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

fn mood_from_score(score: f64) -> &'static str {
    if score > 0.3 {
        "bullish"
    } else if score < -0.3 {
        "bearish"
    } else {
        "neutral"
    }
}

#[async_trait]
impl StageAgent for SentimentAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Sentiment Agent",
            StageName::SentimentAnalysis,
            "Scores recent news coverage of the company and summarizes market perception.",
        )
        .with_capabilities(&["news_sentiment", "brand_perception"])
        .with_tools(&[ToolKind::NewsSentiment])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let sector = request.context.sector_name();

        let output = self
            .deps
            .tools
            .call(&ToolCall::news_sentiment(company, sector), Requirement::BestEffort, request.cancel)
            .await?;
        let mut degraded = output.degraded.then(|| "news search unavailable".to_string());
        let summary: SentimentSummary = serde_json::from_value(output.payload).unwrap_or_default();

        let headlines = summary
            .headlines
            .iter()
            .take(15)
            .map(|h| format!("- [{:?}] {}", h.sentiment, h.title))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Company: {}\nAggregate score: {:.2} ({})\nHeadlines:\n{}",
            company,
            summary.score,
            if summary.overall.is_empty() { "neutral" } else { &summary.overall },
            if headlines.is_empty() { "(none)".to_string() } else { headlines }
        );

        let (market_mood, narrative) = match self.deps.llm.complete_json(prompts::SENTIMENT, &prompt).await {
            Ok(reply) => (
                parse::opt_text(&reply, "market_mood")
                    .map(|m| m.to_lowercase())
                    .unwrap_or_else(|| mood_from_score(summary.score).to_string()),
                parse::text(&reply, "summary"),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "sentiment narrative unavailable");
                degraded.get_or_insert_with(|| "sentiment narrative unavailable".to_string());
                (mood_from_score(summary.score).to_string(), String::new())
            }
        };

        let report = SentimentReport {
            score: summary.score,
            overall: if summary.overall.is_empty() { "neutral".to_string() } else { summary.overall },
            market_mood,
            summary: narrative,
            headlines: summary.headlines,
        };

        Ok(AgentOutput::complete(StagePayload::SentimentAnalysis(report)).with_degraded(degraded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, hit, ScriptedModel};
    use crate::swarm::task::StageContext;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_score_survives_model_outage() {
        let hits = vec![hit("Acme posts record profit and strong growth", "https://news.example/1", "")];
        let agent = SentimentAgent::new(deps(hits, ScriptedModel::failing()));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap();
        let StagePayload::SentimentAnalysis(report) = output.payload else {
            panic!("wrong payload");
        };
        assert_eq!(report.score, 1.0);
        assert_eq!(report.overall, "positive");
        assert_eq!(report.market_mood, "bullish");
        assert_eq!(output.degraded.as_deref(), Some("sentiment narrative unavailable"));
    }
}
