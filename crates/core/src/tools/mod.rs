//! # Tool-Call Layer
//!
//! Named external-data operations (search, page fetch and the heuristics
//! built on top of them) wrapped with caching, retry and degradation.
//!
//! ## Modules
//!
//! - `executor` - `ToolExecutor::call`, tool kinds and argument schemas
//! - `cache` - Sharded TTL cache keyed by (tool, canonical args)
//! - `backoff` - Exponential backoff state machine (also used by the relay)
//! - `providers` - Search / fetch capabilities and their HTTP implementations
//! - `extract` - Relevant-text extraction from HTML
//! - `analysis` - Company evidence, sector voting, headline sentiment

pub mod analysis;
pub mod backoff;
pub mod cache;
pub mod error;
pub mod executor;
pub mod extract;
pub mod providers;

pub use backoff::{Backoff, BackoffPolicy};
pub use cache::{CacheKey, ToolCache};
pub use error::ToolError;
pub use executor::{
    catalogue, Requirement, ToolCall, ToolConfig, ToolExecutor, ToolKind, ToolOutput, ToolSpec,
};
pub use providers::{HttpFetcher, PageFetcher, ProviderError, SearchHit, SearchProvider, SearxngSearch};
