//! # Page Text Extraction
//!
//! Turns raw HTML into the handful of text blocks that matter for a given
//! instruction string: boilerplate elements are stripped, the remaining
//! blocks are ranked by keyword hits and capped in length.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum characters of block text returned
pub const MAX_CONTENT_LENGTH: usize = 5000;

/// Blocks shorter than this are navigation noise
const MIN_BLOCK_LENGTH: usize = 30;

const STOP_WORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "been", "being", "have", "has", "had", "does", "did",
    "will", "would", "could", "should", "may", "might", "can", "for", "with", "from", "into",
    "about", "what", "which", "who", "this", "that", "these", "those", "their", "them", "they",
    "its", "our", "your", "find", "get", "look", "extract", "information", "details", "data",
    "page", "content", "all", "any", "some", "more", "most", "other", "such", "only", "than",
];

/// Extracted page content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageExtract {
    pub title: String,
    pub description: String,
    pub content: String,
    pub blocks_found: usize,
    pub relevant_blocks: usize,
}

fn boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<(script|style|nav|footer|header|aside|noscript|iframe)\b[^>]*>.*?</(script|style|nav|footer|header|aside|noscript|iframe)\s*>",
        )
        .expect("valid boilerplate regex")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"))
}

fn meta_description_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<meta\s+[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
            .expect("valid meta regex")
    })
}

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)</?(p|li|h[1-6]|td|tr|div|section|article|br)\b[^>]*>").expect("valid block regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Keywords worth ranking on, taken from free-text instructions
pub fn extract_keywords(instructions: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in instructions
        .split(|c: char| !c.is_ascii_alphabetic())
        .map(|w| w.to_ascii_lowercase())
    {
        if word.len() > 2 && !STOP_WORDS.contains(&word.as_str()) && !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn clean_text(fragment: &str) -> String {
    let stripped = tag_re().replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    whitespace_re().replace_all(decoded.trim(), " ").to_string()
}

/// Extract instruction-relevant text from an HTML document
pub fn extract_relevant(html: &str, instructions: &str) -> PageExtract {
    let keywords = extract_keywords(instructions);

    let title = title_re()
        .captures(html)
        .map(|c| clean_text(&c[1]))
        .unwrap_or_default();
    let description = meta_description_re()
        .captures(html)
        .map(|c| decode_entities(c[1].trim()))
        .unwrap_or_default();

    let body = boilerplate_re().replace_all(html, " ");
    let body = title_re().replace_all(&body, " ");
    let broken = block_break_re().replace_all(&body, "\n");

    let blocks: Vec<String> = broken
        .split('\n')
        .map(clean_text)
        .filter(|b| b.len() > MIN_BLOCK_LENGTH)
        .collect();

    let mut ranked: Vec<(usize, &String)> = blocks
        .iter()
        .map(|b| {
            let lower = b.to_lowercase();
            (keywords.iter().filter(|k| lower.contains(k.as_str())).count(), b)
        })
        .collect();
    // Stable sort keeps document order among equally scored blocks
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let relevant: Vec<&String> = if keywords.is_empty() {
        blocks.iter().collect()
    } else {
        let matched: Vec<&String> = ranked.iter().filter(|(s, _)| *s > 0).map(|(_, b)| *b).collect();
        if matched.is_empty() {
            blocks.iter().collect()
        } else {
            matched
        }
    };

    let mut parts: Vec<String> = Vec::new();
    if !title.is_empty() {
        parts.push(format!("Page Title: {}", title));
    }
    if !description.is_empty() {
        parts.push(format!("Description: {}", description));
    }
    let mut total: usize = parts.iter().map(|p| p.len()).sum();
    for block in &relevant {
        if total + block.len() > MAX_CONTENT_LENGTH {
            break;
        }
        total += block.len();
        parts.push((*block).clone());
    }

    PageExtract {
        title,
        description,
        content: parts.join("\n\n"),
        blocks_found: blocks.len(),
        relevant_blocks: relevant.len(),
    }
}
