//! # Tool Executor
//!
//! Runs named tool calls against the external providers with caching,
//! per-attempt timeouts, exponential-backoff retry and graceful degradation.
//!
//! ```text
//! call ──► cache hit? ──yes──► payload (from_cache)
//!              │ no
//!              ▼
//!        attempt ◄──── backoff delay ◄── transient failure
//!              │ ok                          │ budget spent
//!              ▼                             ▼
//!        cache insert ──► payload     Required: Exhausted / BestEffort: degraded
//! ```

use super::analysis::{company_evidence, sector_votes, summarize_sentiment};
use super::backoff::BackoffPolicy;
use super::cache::{CacheKey, ToolCache};
use super::error::ToolError;
use super::extract::extract_relevant;
use super::providers::{PageFetcher, ProviderError, SearchHit, SearchProvider};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The tools this layer knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    FetchPage,
    ValidateCompany,
    IdentifySector,
    NewsSentiment,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::WebSearch,
        ToolKind::FetchPage,
        ToolKind::ValidateCompany,
        ToolKind::IdentifySector,
        ToolKind::NewsSentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::FetchPage => "fetch_page",
            ToolKind::ValidateCompany => "validate_company",
            ToolKind::IdentifySector => "identify_sector",
            ToolKind::NewsSentiment => "news_sentiment",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ToolError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "Search the web. Returns de-duplicated hits with URLs and snippets.",
            ToolKind::FetchPage => "Fetch a page and extract the text blocks relevant to the instructions.",
            ToolKind::ValidateCompany => "Check search evidence that a company exists.",
            ToolKind::IdentifySector => "Identify a company's industry sector by keyword voting.",
            ToolKind::NewsSentiment => "Classify recent news headlines about a company.",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_max_results() -> usize {
    5
}

/// Arguments for `web_search`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    /// Independent queries, issued in order
    pub queries: Vec<String>,
    /// Maximum hits kept per query (default: 5)
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// Arguments for `fetch_page`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchPageArgs {
    pub url: String,
    /// Free text describing what to look for on the page
    #[serde(default)]
    pub instructions: String,
}

/// Arguments for `validate_company` and `identify_sector`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompanyArgs {
    pub company_name: String,
}

/// Arguments for `news_sentiment`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewsSentimentArgs {
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
}

/// A (tool, arguments) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: ToolKind,
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: ToolKind, args: Value) -> Self {
        Self { tool, args }
    }

    pub fn web_search<S: Into<String>>(queries: impl IntoIterator<Item = S>, max_results: usize) -> Self {
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        Self::new(ToolKind::WebSearch, json!({ "queries": queries, "max_results": max_results }))
    }

    pub fn fetch_page(url: &str, instructions: &str) -> Self {
        Self::new(ToolKind::FetchPage, json!({ "url": url, "instructions": instructions }))
    }

    pub fn validate_company(company_name: &str) -> Self {
        Self::new(ToolKind::ValidateCompany, json!({ "company_name": company_name }))
    }

    pub fn identify_sector(company_name: &str) -> Self {
        Self::new(ToolKind::IdentifySector, json!({ "company_name": company_name }))
    }

    pub fn news_sentiment(company_name: &str, sector: Option<&str>) -> Self {
        Self::new(
            ToolKind::NewsSentiment,
            json!({ "company_name": company_name, "sector": sector }),
        )
    }

    fn parse_args<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(self.args.clone()).map_err(|e| ToolError::InvalidArguments {
            tool: self.tool.to_string(),
            message: e.to_string(),
        })
    }
}

/// How much the caller depends on a call succeeding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Exhaustion is an error
    Required,
    /// Exhaustion yields a degraded, low-confidence payload
    BestEffort,
}

/// Result of a tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub payload: Value,
    pub degraded: bool,
    pub from_cache: bool,
}

/// Tool layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Cache time-to-live in seconds
    pub cache_ttl_secs: u64,
    pub retry: BackoffPolicy,
    /// Minimum pause between independent queries of one invocation (ms)
    pub inter_query_delay_ms: u64,
    /// Upper bound for a single provider attempt (ms)
    pub call_timeout_ms: u64,
    /// Additional SearXNG instance
    pub searxng_url: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            retry: BackoffPolicy::default(),
            inter_query_delay_ms: 1000,
            call_timeout_ms: 15_000,
            searxng_url: None,
        }
    }
}

impl ToolConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn inter_query_delay(&self) -> Duration {
        Duration::from_millis(self.inter_query_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Discovery entry for one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Name, description and argument schema of every tool
pub fn catalogue() -> Vec<ToolSpec> {
    fn schema<T: JsonSchema>() -> Value {
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
    }

    ToolKind::ALL
        .into_iter()
        .map(|kind| ToolSpec {
            name: kind.as_str(),
            description: kind.description(),
            parameters: match kind {
                ToolKind::WebSearch => schema::<WebSearchArgs>(),
                ToolKind::FetchPage => schema::<FetchPageArgs>(),
                ToolKind::ValidateCompany | ToolKind::IdentifySector => schema::<CompanyArgs>(),
                ToolKind::NewsSentiment => schema::<NewsSentimentArgs>(),
            },
        })
        .collect()
}

/// Executes tool calls. Shared by every task; cheap to clone behind an `Arc`.
pub struct ToolExecutor {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    cache: ToolCache,
    config: ToolConfig,
}

impl ToolExecutor {
    pub fn new(search: Arc<dyn SearchProvider>, fetcher: Arc<dyn PageFetcher>, config: ToolConfig) -> Self {
        Self {
            search,
            fetcher,
            cache: ToolCache::new(config.cache_ttl()),
            config,
        }
    }

    pub fn cache(&self) -> &ToolCache {
        &self.cache
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Run a tool call.
    ///
    /// A live cache entry is returned without touching the network. Only
    /// successful payloads are cached; degraded ones never are.
    #[tracing::instrument(skip(self, cancel), fields(tool = %call.tool))]
    pub async fn call(
        &self,
        call: &ToolCall,
        requirement: Requirement,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let key = CacheKey::new(call.tool.as_str(), &call.args);
        if let Some(payload) = self.cache.get(&key) {
            tracing::debug!(key = key.as_str(), "tool cache hit");
            return Ok(ToolOutput {
                payload,
                degraded: false,
                from_cache: true,
            });
        }

        match self.run(call, cancel).await {
            Ok(payload) => {
                self.cache.insert(key, payload.clone());
                Ok(ToolOutput {
                    payload,
                    degraded: false,
                    from_cache: false,
                })
            }
            Err(e) if requirement == Requirement::BestEffort && e.is_degradable() => {
                tracing::warn!(error = %e, "tool degraded to best-effort result");
                Ok(ToolOutput {
                    payload: degraded_payload(call.tool, &e),
                    degraded: true,
                    from_cache: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<Value, ToolError> {
        match call.tool {
            ToolKind::WebSearch => {
                let args: WebSearchArgs = call.parse_args()?;
                if args.queries.is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool: call.tool.to_string(),
                        message: "at least one query is required".to_string(),
                    });
                }
                let hits = self
                    .search_all(call.tool, &args.queries, args.max_results, cancel)
                    .await?;
                Ok(json!({ "queries": args.queries, "hits": hits }))
            }
            ToolKind::FetchPage => {
                let args: FetchPageArgs = call.parse_args()?;
                let html = self
                    .with_retry(call.tool, cancel, || self.fetcher.fetch(&args.url))
                    .await?;
                let extract = extract_relevant(&html, &args.instructions);
                Ok(json!({
                    "url": args.url,
                    "title": extract.title,
                    "description": extract.description,
                    "content": extract.content,
                    "blocks_found": extract.blocks_found,
                    "relevant_blocks": extract.relevant_blocks,
                }))
            }
            ToolKind::ValidateCompany => {
                let args: CompanyArgs = call.parse_args()?;
                let name = args.company_name.trim();
                let queries = vec![format!("\"{}\" company", name), format!("{} official website", name)];
                let hits = self.search_all(call.tool, &queries, 5, cancel).await?;
                to_payload(call.tool, company_evidence(name, &hits))
            }
            ToolKind::IdentifySector => {
                let args: CompanyArgs = call.parse_args()?;
                let name = args.company_name.trim();
                let queries = vec![
                    format!("{} industry sector", name),
                    format!("{} company business", name),
                    format!("what does {} do", name),
                ];
                let hits = self.search_all(call.tool, &queries, 5, cancel).await?;
                to_payload(call.tool, sector_votes(&hits))
            }
            ToolKind::NewsSentiment => {
                let args: NewsSentimentArgs = call.parse_args()?;
                let name = args.company_name.trim();
                let mut queries = vec![format!("{} news", name), format!("{} latest announcement", name)];
                if let Some(sector) = args.sector.as_deref().filter(|s| !s.is_empty()) {
                    queries.push(format!("{} {} market news", name, sector));
                }
                let hits = self.search_all(call.tool, &queries, 10, cancel).await?;
                to_payload(call.tool, summarize_sentiment(&hits))
            }
        }
    }

    /// Issue independent queries in order, pausing between them.
    ///
    /// A query that exhausts its retries is skipped; the invocation only
    /// fails when every query did.
    async fn search_all(
        &self,
        tool: ToolKind,
        queries: &[String],
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>, ToolError> {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut failure: Option<ToolError> = None;
        let mut succeeded = 0usize;

        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                pause(self.config.inter_query_delay(), cancel).await?;
            }
            match self
                .with_retry(tool, cancel, || self.search.query(query, max_results))
                .await
            {
                Ok(found) => {
                    succeeded += 1;
                    for hit in found {
                        if !hits.iter().any(|h| h.url == hit.url && h.title == hit.title) {
                            hits.push(hit);
                        }
                    }
                }
                Err(e) if e.is_degradable() => {
                    tracing::warn!(query = %query, error = %e, "query abandoned");
                    failure = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match failure {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(hits),
        }
    }

    /// Retry `op` on transient failures following the configured backoff.
    async fn with_retry<T, F, Fut>(
        &self,
        tool: ToolKind,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, ToolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut backoff = self.config.retry.start();
        let mut last_error = ProviderError::Empty;

        while backoff.try_attempt() {
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled);
            }

            let outcome = match tokio::time::timeout(self.config.call_timeout(), op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        tool = %tool,
                        attempt = backoff.attempts(),
                        error = %e,
                        "transient tool failure"
                    );
                    last_error = e;
                    match backoff.next_delay() {
                        Some(delay) => pause(delay, cancel).await?,
                        None => break,
                    }
                }
                Err(e) => {
                    return Err(ToolError::Rejected {
                        tool: tool.to_string(),
                        source: e,
                    })
                }
            }
        }

        Err(ToolError::Exhausted {
            tool: tool.to_string(),
            attempts: backoff.attempts(),
            last_error,
        })
    }
}

/// Sleep unless cancelled first
async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), ToolError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ToolError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

fn to_payload<T: Serialize>(tool: ToolKind, value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Low-confidence stand-in returned when a best-effort call gives up
fn degraded_payload(tool: ToolKind, error: &ToolError) -> Value {
    json!({
        "tool": tool.as_str(),
        "degraded": true,
        "confidence": "low",
        "evidence": [],
        "hits": [],
        "error": error.to_string(),
    })
}
