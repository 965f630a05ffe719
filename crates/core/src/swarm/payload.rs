//! # Stage Payloads
//!
//! One schema per stage, unified in [`StagePayload`]. Serialized as
//! `{"stage": "<name>", "data": {...}}`.

use super::pipeline::StageName;
use crate::tools::analysis::Headline;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Output of the validation stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationReport {
    pub valid: bool,
    /// Normalized company name used by later stages
    pub canonical_name: String,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub details: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorReport {
    pub sector: String,
    pub sub_sectors: Vec<String>,
    pub sic_code: Option<String>,
    pub naics_code: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    /// Keyword votes from search results
    pub votes: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Competitor {
    pub name: String,
    pub description: String,
    pub estimated_market_share: String,
    pub key_strengths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorReport {
    pub competitors: Vec<Competitor>,
    pub total_market_players: u32,
    pub competitive_intensity: String,
}

impl CompetitorReport {
    pub fn names(&self) -> Vec<&str> {
        self.competitors
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialReport {
    pub company_financials: Value,
    pub competitor_financials: Vec<Value>,
    pub financial_comparison: String,
    /// 0 - 10
    pub financial_health_score: f64,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchReport {
    pub company_data: Value,
    pub competitor_data: BTreeMap<String, Value>,
    pub market_data: Value,
    pub pages_read: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentReport {
    /// Mean headline score in [-1.0, 1.0]
    pub score: f64,
    pub overall: String,
    pub market_mood: String,
    pub summary: String,
    pub headlines: Vec<Headline>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendReport {
    pub emerging_trends: Vec<Value>,
    pub declining_trends: Vec<Value>,
    pub opportunities: Vec<Value>,
    pub threats: Vec<Value>,
    pub market_outlook: String,
    pub five_year_forecast: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalReport {
    pub executive_summary: String,
    pub report_markdown: String,
    pub swot: Value,
    pub recommendations: Vec<Value>,
    pub key_metrics: Value,
    pub risk_score: f64,
    pub opportunity_score: f64,
}

/// Structured output of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data", rename_all = "snake_case")]
pub enum StagePayload {
    Validation(ValidationReport),
    SectorIdentification(SectorReport),
    CompetitorDiscovery(CompetitorReport),
    FinancialResearch(FinancialReport),
    DeepResearch(ResearchReport),
    SentimentAnalysis(SentimentReport),
    TrendAnalysis(TrendReport),
    ReportGeneration(FinalReport),
}

impl StagePayload {
    /// The stage this payload belongs to
    pub fn stage(&self) -> StageName {
        match self {
            StagePayload::Validation(_) => StageName::Validation,
            StagePayload::SectorIdentification(_) => StageName::SectorIdentification,
            StagePayload::CompetitorDiscovery(_) => StageName::CompetitorDiscovery,
            StagePayload::FinancialResearch(_) => StageName::FinancialResearch,
            StagePayload::DeepResearch(_) => StageName::DeepResearch,
            StagePayload::SentimentAnalysis(_) => StageName::SentimentAnalysis,
            StagePayload::TrendAnalysis(_) => StageName::TrendAnalysis,
            StagePayload::ReportGeneration(_) => StageName::ReportGeneration,
        }
    }

    /// Empty payload recorded by a degraded stage
    pub fn empty_for(stage: StageName) -> Self {
        match stage {
            StageName::Validation => StagePayload::Validation(ValidationReport::default()),
            StageName::SectorIdentification => StagePayload::SectorIdentification(SectorReport {
                sector: "Unknown".to_string(),
                ..Default::default()
            }),
            StageName::CompetitorDiscovery => StagePayload::CompetitorDiscovery(CompetitorReport::default()),
            StageName::FinancialResearch => StagePayload::FinancialResearch(FinancialReport::default()),
            StageName::DeepResearch => StagePayload::DeepResearch(ResearchReport::default()),
            StageName::SentimentAnalysis => StagePayload::SentimentAnalysis(SentimentReport {
                overall: "neutral".to_string(),
                market_mood: "neutral".to_string(),
                ..Default::default()
            }),
            StageName::TrendAnalysis => StagePayload::TrendAnalysis(TrendReport::default()),
            StageName::ReportGeneration => StagePayload::ReportGeneration(FinalReport::default()),
        }
    }
}
