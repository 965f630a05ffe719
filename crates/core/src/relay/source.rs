//! Upstream side of the relay: where a task's events come from.

use crate::swarm::coordinator::Coordinator;
use crate::swarm::task::Task;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// Raw upstream frames of one task, in emission order. The stream ending
/// means the upstream link is gone.
pub type Upstream = BoxStream<'static, Result<String, UpstreamError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream disconnected")]
    Disconnected,
    /// The subscriber fell behind and frames were skipped
    #[error("upstream lagged, {0} events skipped")]
    Lagged(u64),
}

/// Authoritative event source for tasks
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn subscribe(&self, task_id: &str) -> Result<Upstream, UpstreamError>;

    /// Current task state, `None` for unknown tasks
    async fn snapshot(&self, task_id: &str) -> Option<Task>;

    /// Called once the relay dropped its subscription
    fn release(&self, task_id: &str);
}

#[async_trait]
impl ProgressSource for Coordinator {
    async fn subscribe(&self, task_id: &str) -> Result<Upstream, UpstreamError> {
        let receiver = self
            .bus()
            .subscribe(task_id)
            .ok_or_else(|| UpstreamError::Unavailable("event bus unavailable".to_string()))?;

        let frames = BroadcastStream::new(receiver).map(|item| match item {
            Ok(event) => serde_json::to_string(&event).map_err(|_| UpstreamError::Disconnected),
            Err(BroadcastStreamRecvError::Lagged(n)) => Err(UpstreamError::Lagged(n)),
        });
        Ok(frames.boxed())
    }

    async fn snapshot(&self, task_id: &str) -> Option<Task> {
        self.get_status(task_id).await
    }

    fn release(&self, task_id: &str) {
        self.bus().release(task_id);
    }
}
