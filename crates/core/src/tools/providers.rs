//! # Data Providers
//!
//! External capabilities the tool layer wraps: a search provider and a page
//! fetcher. Both are unreliable; their failures are classified here so the
//! executor can decide what to retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Failure reported by a provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("no results")]
    Empty,
    #[error("malformed content: {0}")]
    Malformed(String),
    #[error("http status {0}")]
    Status(u16),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout
            | ProviderError::RateLimited
            | ProviderError::Empty => true,
            ProviderError::Status(code) => *code >= 500,
            ProviderError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                ProviderError::RateLimited
            } else {
                ProviderError::Status(status.as_u16())
            }
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// Web search capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn query(&self, text: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Page fetch capability
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;
}

/// SearXNG JSON API client.
///
/// Tries each configured endpoint in order and returns the first usable
/// answer. An empty answer from every endpoint is reported as `Empty`.
pub struct SearxngSearch {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl SearxngSearch {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("scout-research/1.0")
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Endpoint list: `SEARXNG_URL` first, then an optional configured
    /// instance, then the local default.
    pub fn default_endpoints(configured: Option<&str>) -> Vec<String> {
        let mut endpoints = Vec::new();
        if let Ok(custom_url) = std::env::var("SEARXNG_URL") {
            endpoints.push(format!("{}/search", custom_url.trim_end_matches('/')));
        }
        if let Some(url) = configured {
            endpoints.push(format!("{}/search", url.trim_end_matches('/')));
        }
        endpoints.push("http://localhost:8888/search".to_string());
        endpoints.dedup();
        endpoints
    }
}

#[async_trait]
impl SearchProvider for SearxngSearch {
    async fn query(&self, text: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let mut last_error = ProviderError::Empty;

        for endpoint in &self.endpoints {
            let url = format!("{}?q={}&format=json", endpoint, urlencoding::encode(text));

            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "search endpoint unreachable");
                    last_error = e.into();
                    continue;
                }
            };

            if response.status().as_u16() == 429 {
                last_error = ProviderError::RateLimited;
                continue;
            }
            if !response.status().is_success() {
                last_error = ProviderError::Status(response.status().as_u16());
                continue;
            }

            let json: serde_json::Value = match response.json().await {
                Ok(json) => json,
                Err(e) => {
                    last_error = ProviderError::Malformed(e.to_string());
                    continue;
                }
            };

            let hits: Vec<SearchHit> = json
                .get("results")
                .and_then(|r| r.as_array())
                .map(|results| {
                    results
                        .iter()
                        .take(max_results)
                        .map(|r| SearchHit {
                            title: str_field(r, "title"),
                            url: str_field(r, "url"),
                            snippet: str_field(r, "content"),
                        })
                        .collect()
                })
                .unwrap_or_default();

            if !hits.is_empty() {
                return Ok(hits);
            }
        }

        Err(last_error)
    }
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Plain HTTP page fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Empty.is_transient());
        assert!(ProviderError::Status(503).is_transient());
        assert!(!ProviderError::Status(404).is_transient());
        assert!(!ProviderError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn test_default_endpoints_end_with_local() {
        let endpoints = SearxngSearch::default_endpoints(Some("https://search.example.org/"));
        assert!(endpoints.contains(&"https://search.example.org/search".to_string()));
        assert_eq!(endpoints.last().unwrap(), "http://localhost:8888/search");
    }
}
