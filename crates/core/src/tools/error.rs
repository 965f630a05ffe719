//! Tool-call errors

use super::providers::ProviderError;
use thiserror::Error;

/// Failure surfaced by [`super::ToolExecutor::call`].
///
/// Transient provider failures never escape the executor: they are retried
/// and only show up here once the retry budget is spent.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("{tool}: retries exhausted after {attempts} attempts ({last_error})")]
    Exhausted {
        tool: String,
        attempts: u32,
        last_error: ProviderError,
    },

    #[error("{tool}: provider rejected the request ({source})")]
    Rejected {
        tool: String,
        #[source]
        source: ProviderError,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

impl ToolError {
    /// Whether a best-effort caller may substitute a degraded payload
    pub fn is_degradable(&self) -> bool {
        matches!(self, ToolError::Exhausted { .. } | ToolError::Rejected { .. })
    }
}
