//! # Validation Agent
//!
//! First stage. Confirms the subject is a real company and settles the
//! canonical name every later stage uses. Unverifiable input is fatal.

use super::parse;
use super::prompts;
use super::{AgentCard, AgentDeps, AgentError, AgentOutput, AgentRequest, StageAgent};
use crate::swarm::payload::{StagePayload, ValidationReport};
use crate::swarm::pipeline::StageName;
use crate::swarm::task::TaskErrorKind;
use crate::tools::analysis::CompanyEvidence;
use crate::tools::{Requirement, ToolCall, ToolKind};
use async_trait::async_trait;

pub struct ValidationAgent {
    deps: AgentDeps,
}

impl ValidationAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for ValidationAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new(
            "Validation Agent",
            StageName::Validation,
            "Verifies that the research subject is a real company and resolves its canonical name.",
        )
        .with_capabilities(&["company_name_validation", "entity_resolution", "confidence_scoring"])
        .with_tools(&[ToolKind::ValidateCompany])
    }

    #[tracing::instrument(skip(self, request), fields(task_id = request.task_id))]
    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(AgentError::fatal(TaskErrorKind::InputUnverified, "empty subject"));
        }

        let output = self
            .deps
            .tools
            .call(&ToolCall::validate_company(subject), Requirement::Required, request.cancel)
            .await?;
        let evidence: CompanyEvidence = serde_json::from_value(output.payload).unwrap_or_default();

        let prompt = format!(
            "Subject: {}\nEvidence confidence: {}\nEvidence:\n{}",
            subject,
            evidence.confidence,
            if evidence.evidence.is_empty() {
                "(none)".to_string()
            } else {
                evidence.evidence.iter().map(|e| format!("- {}", e)).collect::<Vec<_>>().join("\n")
            }
        );

        // The model refines the heuristic verdict; without it the evidence stands alone
        let verdict = match self.deps.llm.complete_json(prompts::VALIDATION, &prompt).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(error = %e, "validation model call failed, using search evidence only");
                None
            }
        };

        let heuristic_confidence = parse::label_confidence(&evidence.confidence).unwrap_or(0.3);
        let report = match &verdict {
            Some(reply) => ValidationReport {
                valid: parse::flag(reply, "valid").unwrap_or(evidence.is_valid),
                canonical_name: parse::opt_text(reply, "canonical_name").unwrap_or_else(|| subject.to_string()),
                confidence: parse::confidence(reply, "confidence").unwrap_or(heuristic_confidence),
                details: parse::text(reply, "details"),
                evidence: evidence.evidence.clone(),
            },
            None => ValidationReport {
                valid: evidence.is_valid,
                canonical_name: subject.to_string(),
                confidence: heuristic_confidence,
                details: format!("{} evidence item(s) found", evidence.evidence.len()),
                evidence: evidence.evidence.clone(),
            },
        };

        if !report.valid {
            let reason = if report.details.is_empty() {
                format!("no evidence that '{}' is a company", subject)
            } else {
                report.details.clone()
            };
            return Err(AgentError::fatal(TaskErrorKind::InputUnverified, reason));
        }

        let degraded = verdict
            .is_none()
            .then(|| "validated from search evidence only".to_string());
        Ok(AgentOutput::complete(StagePayload::Validation(report)).with_degraded(degraded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{deps, hit, ScriptedModel};
    use crate::swarm::task::StageContext;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn acme_hits() -> Vec<crate::tools::SearchHit> {
        vec![
            hit("Acme Corp - Official Site", "https://www.acme.com", "Acme Corp is a maker of anvils."),
            hit("Acme Corp | Reuters", "https://www.reuters.com/company/acme", "Revenue, employees"),
        ]
    }

    #[tokio::test]
    async fn test_model_canonicalizes_name() {
        let model = ScriptedModel::replying(json!({
            "valid": true,
            "canonical_name": "Acme Corporation",
            "confidence": "0.95",
            "details": "Well known manufacturer"
        }));
        let agent = ValidationAgent::new(deps(acme_hits(), model));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "acme corp", context: &context, cancel: &cancel })
            .await
            .unwrap();

        match output.payload {
            StagePayload::Validation(report) => {
                assert!(report.valid);
                assert_eq!(report.canonical_name, "Acme Corporation");
                assert_eq!(report.confidence, 0.95);
                assert!(!report.evidence.is_empty());
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(output.degraded.is_none());
    }

    #[tokio::test]
    async fn test_unverified_subject_is_fatal() {
        let model = ScriptedModel::replying(json!({ "valid": false, "details": "Not a company" }));
        let agent = ValidationAgent::new(deps(acme_hits(), model));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let err = agent
            .invoke(AgentRequest { task_id: "t1", subject: "asdfgh", context: &context, cancel: &cancel })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Fatal { kind: TaskErrorKind::InputUnverified, .. }));
    }

    #[tokio::test]
    async fn test_falls_back_to_evidence_without_model() {
        let agent = ValidationAgent::new(deps(acme_hits(), ScriptedModel::failing()));
        let context = StageContext::new();
        let cancel = CancellationToken::new();

        let output = agent
            .invoke(AgentRequest { task_id: "t1", subject: "Acme Corp", context: &context, cancel: &cancel })
            .await
            .unwrap();
        assert!(output.degraded.is_some());
        assert!(matches!(output.payload, StagePayload::Validation(ref r) if r.canonical_name == "Acme Corp"));
    }
}
