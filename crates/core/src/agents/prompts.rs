//! System prompts bundled at compile time.

/// Validation - is the subject a real company?
pub const VALIDATION: &str = include_str!("defaults/validation.md");

/// Sector - industry classification
pub const SECTOR: &str = include_str!("defaults/sector.md");

/// Competitor - competitor discovery
pub const COMPETITOR: &str = include_str!("defaults/competitor.md");

/// Financial - figures and comparison
pub const FINANCIAL: &str = include_str!("defaults/financial.md");

/// Research - per-company page summarization
pub const RESEARCH_ENTITY: &str = include_str!("defaults/research_entity.md");

/// Research - market overview
pub const RESEARCH_MARKET: &str = include_str!("defaults/research_market.md");

/// Sentiment - mood and summary on top of headline scores
pub const SENTIMENT: &str = include_str!("defaults/sentiment.md");

/// Trend - trends, opportunities and threats
pub const TREND: &str = include_str!("defaults/trend.md");

/// Report - final synthesis
pub const REPORT: &str = include_str!("defaults/report.md");
