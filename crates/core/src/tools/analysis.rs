//! # Search Result Analysis
//!
//! Deterministic heuristics applied to raw search hits: company evidence,
//! sector voting and headline sentiment. Pure functions, no I/O.

use super::providers::SearchHit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OFFICIAL_TLDS: &[&str] = &[".com", ".io", ".org", ".net", ".co", ".ai"];

const BUSINESS_TERMS: &[&str] = &[
    "inc", "llc", "ltd", "corporation", "company", "enterprise", "group", "holdings", "founded",
    "headquartered", "ceo", "revenue", "employees", "nasdaq", "nyse", "stock", "ipo", "startup",
    "funding", "series a", "series b", "valuation",
];

const TRUSTED_SOURCES: &[&str] = &[
    "wikipedia", "bloomberg", "reuters", "crunchbase", "linkedin", "forbes", "techcrunch", "wsj",
    "ft.com", "sec.gov",
];

const DESCRIPTION_PHRASES: &[&str] = &["is a", "was founded", "provides", "offers", "specializes", "develops"];

const OFFICIAL_PHRASES: &[&str] = &["official site", "official website", "official page", "home page"];

const SECTOR_PATTERNS: &[(&str, &[&str])] = &[
    ("Technology", &["software", "cloud", "saas", "artificial intelligence", "semiconductor", "internet", "platform", "cybersecurity"]),
    ("Finance", &["bank", "banking", "fintech", "insurance", "investment", "asset management", "payments", "lending"]),
    ("Healthcare", &["pharmaceutical", "biotech", "medical", "hospital", "health care", "healthcare", "clinical", "drug"]),
    ("Retail", &["retail", "e-commerce", "ecommerce", "store", "shopping", "consumer goods", "apparel"]),
    ("Manufacturing", &["manufacturing", "industrial", "factory", "machinery", "aerospace", "automotive"]),
    ("Energy", &["oil", "gas", "renewable", "solar", "wind power", "utility", "electricity", "battery"]),
    ("Media", &["media", "entertainment", "streaming", "publishing", "broadcast", "gaming", "film"]),
    ("Telecommunications", &["telecom", "wireless", "broadband", "5g", "mobile network", "carrier"]),
];

const POSITIVE_WORDS: &[&str] = &[
    "growth", "profit", "surge", "record", "beat", "gain", "rise", "strong", "expand", "success",
    "upgrade", "innovation", "launch", "partnership", "win", "boost", "rally", "outperform",
];

const NEGATIVE_WORDS: &[&str] = &[
    "loss", "decline", "drop", "fall", "lawsuit", "layoff", "cut", "weak", "miss", "downgrade",
    "scandal", "fraud", "investigation", "recall", "slump", "crash", "disappointing", "restructuring",
];

/// Evidence that a subject is a real company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyEvidence {
    pub company: String,
    pub is_valid: bool,
    pub confidence: String,
    pub evidence: Vec<String>,
}

/// Weigh search hits for signs that `company` is a real business
pub fn company_evidence(company: &str, hits: &[SearchHit]) -> CompanyEvidence {
    let company_lower = company.trim().to_lowercase();
    let first_word = company_lower.split_whitespace().next().unwrap_or("");
    let mut evidence: Vec<String> = Vec::new();
    let mut push = |item: String| {
        if !evidence.contains(&item) {
            evidence.push(item);
        }
    };

    for hit in hits {
        let url = hit.url.to_lowercase();
        let combined = format!("{} {} {}", hit.title, hit.snippet, hit.url).to_lowercase();

        if !first_word.is_empty()
            && url.contains(first_word)
            && OFFICIAL_TLDS.iter().any(|tld| url.contains(tld))
        {
            push(format!("Official domain found: {}", hit.url));
        }
        if OFFICIAL_PHRASES.iter().any(|p| combined.contains(p)) {
            push(format!("Official site mention in: {}", hit.title));
        }
        if combined.contains(&company_lower) && DESCRIPTION_PHRASES.iter().any(|p| combined.contains(p)) {
            push(format!("Company description found: {}", hit.title));
        }
        if BUSINESS_TERMS.iter().any(|t| combined.contains(t)) {
            push(format!("Business terminology found: {}", hit.title));
        }
        if TRUSTED_SOURCES.iter().any(|s| url.contains(s)) {
            push(format!("Trusted source mention: {}", hit.url));
        }
    }

    let count = evidence.len();
    let confidence = if count >= 4 {
        "high"
    } else if count >= 2 {
        "medium"
    } else {
        "low"
    };

    CompanyEvidence {
        company: company.trim().to_string(),
        is_valid: count >= 2,
        confidence: confidence.to_string(),
        evidence,
    }
}

/// Sector vote tally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorVotes {
    pub sector: String,
    pub confidence: String,
    pub votes: BTreeMap<String, u32>,
}

/// Count sector keyword matches, one vote per sector per hit
pub fn sector_votes(hits: &[SearchHit]) -> SectorVotes {
    let mut votes: BTreeMap<String, u32> = BTreeMap::new();
    for hit in hits {
        let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
        for (sector, keywords) in SECTOR_PATTERNS {
            if keywords.iter().any(|k| text.contains(k)) {
                *votes.entry(sector.to_string()).or_insert(0) += 1;
            }
        }
    }

    // Ties resolve to the alphabetically first sector
    let top = votes
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(s, c)| (s.clone(), *c));

    match top {
        Some((sector, count)) => SectorVotes {
            sector,
            confidence: if count >= 5 {
                "high"
            } else if count >= 3 {
                "medium"
            } else {
                "low"
            }
            .to_string(),
            votes,
        },
        None => SectorVotes {
            sector: "Unknown".to_string(),
            confidence: "low".to_string(),
            votes,
        },
    }
}

/// Sentiment label of a single headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    fn score(self) -> f64 {
        match self {
            Sentiment::Positive => 1.0,
            Sentiment::Neutral => 0.0,
            Sentiment::Negative => -1.0,
        }
    }
}

/// Lexicon classification of a headline
pub fn classify_headline(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    }
}

/// A classified headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub sentiment: Sentiment,
}

/// Aggregate sentiment over a set of headlines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSummary {
    /// Mean score in [-1.0, 1.0]
    pub score: f64,
    pub overall: String,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub headlines: Vec<Headline>,
}

/// Classify de-duplicated headlines and aggregate them
pub fn summarize_sentiment(hits: &[SearchHit]) -> SentimentSummary {
    let mut seen: Vec<String> = Vec::new();
    let mut headlines: Vec<Headline> = Vec::new();

    for hit in hits {
        let key = hit.title.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        headlines.push(Headline {
            title: hit.title.trim().to_string(),
            snippet: hit.snippet.chars().take(200).collect(),
            source: hit.url.clone(),
            sentiment: classify_headline(&format!("{} {}", hit.title, hit.snippet)),
        });
    }

    let count = |s: Sentiment| headlines.iter().filter(|h| h.sentiment == s).count();
    let score = if headlines.is_empty() {
        0.0
    } else {
        let total: f64 = headlines.iter().map(|h| h.sentiment.score()).sum();
        (total / headlines.len() as f64 * 100.0).round() / 100.0
    };
    let overall = if score > 0.3 {
        "positive"
    } else if score < -0.3 {
        "negative"
    } else {
        "neutral"
    };

    SentimentSummary {
        score,
        overall: overall.to_string(),
        positive: count(Sentiment::Positive),
        negative: count(Sentiment::Negative),
        neutral: count(Sentiment::Neutral),
        headlines,
    }
}
