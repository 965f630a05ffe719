//! # Report Agent
//!
//! Last stage. Synthesizes every earlier finding into the final report.
//! Runs under the fatal policy: a task without a report has failed.

use super::parse;
use super::prompts;
use super::{AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{FinalReport, StagePayload};
use crate::swarm::pipeline::StageName;
use crate::swarm::task::{StageContext, TaskErrorKind};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Characters of serialized findings handed to the model
const FINDINGS_BUDGET: usize = 12_000;

pub struct ReportAgent {
    deps: AgentDeps,
}

impl ReportAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

/// Earlier findings keyed by stage name, with degraded stages flagged
fn findings(context: &StageContext) -> String {
    let mut map = Map::new();
    for entry in context.entries() {
        let data = match serde_json::to_value(&entry.payload) {
            Ok(mut v) => v.get_mut("data").map(Value::take).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        };
        let value = match &entry.degraded {
            Some(note) => serde_json::json!({ "degraded": note, "data": data }),
            None => data,
        };
        map.insert(entry.stage.as_str().to_string(), value);
    }
    let text = Value::Object(map).to_string();
    text.chars().take(FINDINGS_BUDGET).collect()
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)\n".to_string();
    }
    items.iter().map(|i| format!("- {}\n", i)).collect()
}

/// Minimal Markdown rendition used when the model returns no Markdown
fn render_markdown(company: &str, report: &FinalReport) -> String {
    let mut md = format!("# Market Research Report: {}\n\n## Executive Summary\n\n{}\n\n", company, report.executive_summary);

    md.push_str("## SWOT Analysis\n\n");
    for (title, key) in [
        ("Strengths", "strengths"),
        ("Weaknesses", "weaknesses"),
        ("Opportunities", "opportunities"),
        ("Threats", "threats"),
    ] {
        md.push_str(&format!("### {}\n\n{}\n", title, bullet_list(&parse::strings(&report.swot, key))));
    }

    md.push_str("## Recommendations\n\n");
    for (i, rec) in report.recommendations.iter().enumerate() {
        md.push_str(&format!(
            "{}. **{}** ({}): {}\n",
            i + 1,
            parse::text(rec, "title"),
            parse::opt_text(rec, "priority").unwrap_or_else(|| "medium".to_string()),
            parse::text(rec, "description")
        ));
    }
    md.push_str(&format!(
        "\n**Risk score:** {:.1} / 10  \n**Opportunity score:** {:.1} / 10\n",
        report.risk_score, report.opportunity_score
    ));
    md
}

#[async_trait]
impl StageAgent for ReportAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Report Agent",
            StageName::ReportGeneration,
            "Synthesizes all findings into an executive summary, SWOT analysis and recommendations.",
        )
        .with_capabilities(&["report_synthesis", "swot_analysis", "recommendations"])
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let company = request.context.company_name(request.subject);
        let prompt = format!("Company: {}\n\nFindings:\n{}", company, findings(request.context));

        let reply = self
            .deps
            .llm
            .complete_json(prompts::REPORT, &prompt)
            .await
            .map_err(AgentError::llm)?;

        let mut report = FinalReport {
            executive_summary: parse::text(&reply, "executive_summary"),
            report_markdown: parse::text(&reply, "report_markdown"),
            swot: parse::object(&reply, "swot"),
            recommendations: parse::list(&reply, "recommendations"),
            key_metrics: parse::object(&reply, "key_metrics"),
            risk_score: parse::number(&reply, "risk_score").map(|s| s.clamp(0.0, 10.0)).unwrap_or(0.0),
            opportunity_score: parse::number(&reply, "opportunity_score")
                .map(|s| s.clamp(0.0, 10.0))
                .unwrap_or(0.0),
        };

        if report.executive_summary.is_empty() && report.report_markdown.is_empty() {
            return Err(AgentError::fatal(
                TaskErrorKind::AgentFailure,
                "report model returned neither a summary nor a report",
            ));
        }
        if report.report_markdown.is_empty() {
            report.report_markdown = render_markdown(company, &report);
        }

        Ok(AgentOutput::complete(StagePayload::ReportGeneration(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, ScriptedModel};
    use crate::swarm::task::StageResult;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn context_with_degraded_sector() -> StageContext {
        let mut context = StageContext::new();
        context
            .append(StageResult {
                stage: StageName::SectorIdentification,
                success: true,
                duration_ms: 3,
                payload: StagePayload::empty_for(StageName::SectorIdentification),
                degraded: Some("sector search unavailable".to_string()),
                error: None,
            })
            .unwrap();
        context
    }

    #[tokio::test]
    async fn test_markdown_rendered_when_missing() {
        let model = ScriptedModel::replying(json!({
            "executive_summary": "Acme is doing fine.",
            "swot": { "strengths": ["Brand"], "threats": "Roadrunner" },
            "recommendations": [{ "title": "Expand", "description": "Go west", "priority": "high" }],
            "risk_score": "4.5"
        }));
        let agent = ReportAgent::new(deps(vec![], model.clone()));
        let context = context_with_degraded_sector();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap();
        let StagePayload::ReportGeneration(report) = output.payload else {
            panic!("wrong payload");
        };
        assert_eq!(report.risk_score, 4.5);
        assert!(report.report_markdown.contains("# Market Research Report: Acme"));
        assert!(report.report_markdown.contains("- Roadrunner"));
        assert!(report.report_markdown.contains("1. **Expand** (high): Go west"));

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("\"degraded\":\"sector search unavailable\""));
    }

    #[tokio::test]
    async fn test_empty_reply_is_fatal() {
        let agent = ReportAgent::new(deps(vec![], ScriptedModel::replying(json!({}))));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let err = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme", context: &context, cancel: &cancel })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Fatal { kind: TaskErrorKind::AgentFailure, .. }));
    }
}
