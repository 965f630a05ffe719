//! # Relay Hub
//!
//! Fans one upstream subscription per task out to every attached observer.
//!
//! Each observed task gets a [`TaskChannel`]: its observer set behind its own
//! mutex plus one spawned pump that owns the upstream stream. The global map
//! is only a lookup table, so unrelated tasks never contend.
//!
//! ```text
//! ProgressSource ──► pump(task) ──┬──► observer 1
//!                                 ├──► observer 2
//!                                 └──► observer n
//! ```

use super::messages::{reply_to, ObserverMessage};
use super::source::{ProgressSource, UpstreamError};
use crate::swarm::events::ProgressEvent;
use crate::swarm::task::Task;
use crate::tools::backoff::{Backoff, BackoffPolicy};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Relay tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Messages buffered per observer before it counts as too slow
    pub observer_queue: usize,
    /// Upstream reconnect schedule
    pub reconnect: BackoffPolicy,
    /// Silence after which the socket layer sends a keepalive
    pub keepalive_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            observer_queue: 64,
            reconnect: BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(10), 5),
            keepalive_interval_secs: 30,
        }
    }
}

impl RelayConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs.max(1))
    }
}

/// An attached observer's end of the relay
#[derive(Debug)]
pub struct Observer {
    pub id: u64,
    pub task_id: String,
    pub messages: mpsc::Receiver<ObserverMessage>,
}

impl Observer {
    /// Next message; `None` once the relay let go of this observer
    pub async fn recv(&mut self) -> Option<ObserverMessage> {
        self.messages.recv().await
    }
}

struct Slot {
    sender: mpsc::Sender<ObserverMessage>,
    /// Sequence covered by the last snapshot this observer got.
    /// `None` until its initial state was sent.
    since: Option<u64>,
}

#[derive(Default)]
struct ObserverSet {
    slots: HashMap<u64, Slot>,
    closed: bool,
}

struct TaskChannel {
    task_id: String,
    observers: Mutex<ObserverSet>,
    joins: mpsc::UnboundedSender<u64>,
    shutdown: CancellationToken,
}

type Registry = Arc<RwLock<HashMap<String, Arc<TaskChannel>>>>;

impl TaskChannel {
    fn lock(&self) -> MutexGuard<'_, ObserverSet> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the channel once nobody is left. Returns whether observers remain.
    fn reap(&self, set: &mut ObserverSet) -> bool {
        if !set.slots.is_empty() {
            return true;
        }
        if !set.closed {
            set.closed = true;
            self.shutdown.cancel();
        }
        false
    }

    fn close(&self) {
        let mut set = self.lock();
        set.closed = true;
        set.slots.clear();
        self.shutdown.cancel();
    }

    fn observer_ids(&self) -> Vec<u64> {
        self.lock().slots.keys().copied().collect()
    }

    fn pending_ids(&self) -> Vec<u64> {
        self.lock()
            .slots
            .iter()
            .filter(|(_, slot)| slot.since.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Deliver to every observer. Sequenced messages only reach observers
    /// whose snapshot does not already cover them; unsequenced ones skip
    /// observers still waiting for their initial state, except a final
    /// error. Slow or gone observers are dropped.
    fn broadcast(&self, message: &ObserverMessage, sequence: Option<u64>) {
        let terminal_notice = matches!(message, ObserverMessage::Error { recoverable: false, .. });
        let mut set = self.lock();
        set.slots.retain(|id, slot| {
            let deliver = match (sequence, slot.since) {
                (Some(sequence), Some(since)) => sequence > since,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (None, None) => terminal_notice,
            };
            if !deliver {
                return true;
            }
            match slot.sender.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(task_id = %self.task_id, observer = id, "observer too slow, dropping");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(task_id = %self.task_id, observer = id, "observer gone");
                    false
                }
            }
        });
        self.reap(&mut set);
    }

    /// Send `snapshot` as initial state to the given observers. With `force`
    /// observers that were already synced are resent too.
    fn sync(&self, ids: &[u64], snapshot: Option<&Task>, force: bool) -> bool {
        let mut set = self.lock();
        for id in ids {
            let Some(slot) = set.slots.get_mut(id) else {
                continue;
            };
            if !force && slot.since.is_some() {
                continue;
            }
            let keep = match snapshot {
                None => {
                    let _ = slot
                        .sender
                        .try_send(ObserverMessage::error(&self.task_id, "unknown task", false));
                    false
                }
                Some(task) => {
                    let sent = slot.sender.try_send(ObserverMessage::initial_state(task)).is_ok();
                    slot.since = Some(task.sequence);
                    if task.status.is_terminal() {
                        let _ = slot.sender.try_send(ObserverMessage::completion_from(task));
                        false
                    } else {
                        sent
                    }
                }
            };
            if !keep {
                set.slots.remove(id);
            }
        }
        self.reap(&mut set)
    }
}

fn forget(registry: &Registry, channel: &Arc<TaskChannel>) {
    let mut map = registry.write().unwrap_or_else(PoisonError::into_inner);
    if map
        .get(&channel.task_id)
        .map(|c| Arc::ptr_eq(c, channel))
        .unwrap_or(false)
    {
        map.remove(&channel.task_id);
    }
}

/// The upstream side of one task channel
struct Pump {
    source: Arc<dyn ProgressSource>,
    channel: Arc<TaskChannel>,
    policy: BackoffPolicy,
    registry: Registry,
}

impl Pump {
    async fn run(self, mut joins: mpsc::UnboundedReceiver<u64>) {
        let task_id = self.channel.task_id.clone();
        tracing::debug!(task_id = %task_id, "upstream pump started");

        self.pump(&mut joins).await;

        self.channel.close();
        forget(&self.registry, &self.channel);
        self.source.release(&task_id);
        tracing::debug!(task_id = %task_id, "upstream pump stopped");
    }

    async fn pump(&self, joins: &mut mpsc::UnboundedReceiver<u64>) {
        let task_id = self.channel.task_id.as_str();
        let shutdown = self.channel.shutdown.clone();
        let mut backoff = self.policy.start();
        let mut resume = false;

        loop {
            let subscribed = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                result = self.source.subscribe(task_id) => result,
            };
            let mut upstream = match subscribed {
                Ok(upstream) => upstream,
                Err(e) => {
                    if !self.wait_to_reconnect(&mut backoff, &e, &shutdown).await {
                        return;
                    }
                    resume = true;
                    continue;
                }
            };
            if resume {
                tracing::info!(task_id, "upstream resumed");
                if !self.admit(self.channel.observer_ids(), true).await {
                    return;
                }
            }

            let lost = loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    Some(id) = joins.recv() => {
                        if !self.admit(vec![id], false).await {
                            return;
                        }
                    }
                    frame = upstream.next() => match frame {
                        Some(Ok(text)) => {
                            backoff.reset();
                            if self.deliver(&text) {
                                self.admit(self.channel.pending_ids(), false).await;
                                return;
                            }
                        }
                        Some(Err(UpstreamError::Lagged(skipped))) => {
                            tracing::warn!(task_id, skipped, "relay fell behind, resyncing");
                            self.channel.broadcast(
                                &ObserverMessage::error(task_id, format!("missed {} events, resyncing", skipped), true),
                                None,
                            );
                            if !self.admit(self.channel.observer_ids(), true).await {
                                return;
                            }
                        }
                        Some(Err(e)) => break e,
                        None => break UpstreamError::Disconnected,
                    },
                }
            };
            drop(upstream);

            // The task may have finished while the link was down
            if let Some(task) = self.source.snapshot(task_id).await {
                if task.status.is_terminal() {
                    self.channel.sync(&self.channel.observer_ids(), Some(&task), true);
                    return;
                }
            }

            tracing::warn!(task_id, error = %lost, "upstream lost");
            self.channel.broadcast(
                &ObserverMessage::error(task_id, format!("{}, reconnecting", lost), true),
                None,
            );
            if !self.wait_to_reconnect(&mut backoff, &lost, &shutdown).await {
                return;
            }
            resume = true;
        }
    }

    /// Parse and fan out one frame. Returns true for the task's last event.
    fn deliver(&self, text: &str) -> bool {
        match serde_json::from_str::<ProgressEvent>(text) {
            Ok(event) => {
                let sequence = event.sequence;
                let message = ObserverMessage::from_event(event);
                let terminal = message.is_completion();
                self.channel.broadcast(&message, Some(sequence));
                terminal
            }
            Err(_) => {
                let raw = ObserverMessage::Raw {
                    task_id: self.channel.task_id.clone(),
                    payload: text.to_string(),
                };
                self.channel.broadcast(&raw, None);
                false
            }
        }
    }

    async fn admit(&self, ids: Vec<u64>, force: bool) -> bool {
        if ids.is_empty() {
            return !self.channel.observer_ids().is_empty();
        }
        let snapshot = self.source.snapshot(&self.channel.task_id).await;
        self.channel.sync(&ids, snapshot.as_ref(), force)
    }

    async fn wait_to_reconnect(
        &self,
        backoff: &mut Backoff,
        error: &UpstreamError,
        shutdown: &CancellationToken,
    ) -> bool {
        let task_id = self.channel.task_id.as_str();
        let delay = if backoff.try_attempt() { backoff.next_delay() } else { None };
        let Some(delay) = delay else {
            tracing::error!(task_id, attempts = backoff.attempts(), error = %error, "giving up on upstream");
            self.channel.broadcast(
                &ObserverMessage::error(
                    task_id,
                    format!("upstream unavailable after {} attempts: {}", backoff.attempts(), error),
                    false,
                ),
                None,
            );
            return false;
        };

        tracing::info!(task_id, attempt = backoff.attempts(), delay_ms = delay.as_millis() as u64, "reconnecting upstream");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// The progress relay
pub struct ProgressRelay {
    source: Arc<dyn ProgressSource>,
    config: RelayConfig,
    channels: Registry,
    next_observer: AtomicU64,
}

impl ProgressRelay {
    pub fn new(source: Arc<dyn ProgressSource>, config: RelayConfig) -> Self {
        Self {
            source,
            config,
            channels: Arc::new(RwLock::new(HashMap::new())),
            next_observer: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn lookup(&self, task_id: &str) -> Option<Arc<TaskChannel>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }

    fn channel_for(&self, task_id: &str) -> Arc<TaskChannel> {
        if let Some(channel) = self.lookup(task_id) {
            return channel;
        }
        let mut map = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(task_id.to_string())
            .or_insert_with(|| {
                let (joins, joins_rx) = mpsc::unbounded_channel();
                let channel = Arc::new(TaskChannel {
                    task_id: task_id.to_string(),
                    observers: Mutex::new(ObserverSet::default()),
                    joins,
                    shutdown: CancellationToken::new(),
                });
                let pump = Pump {
                    source: self.source.clone(),
                    channel: channel.clone(),
                    policy: self.config.reconnect,
                    registry: self.channels.clone(),
                };
                tokio::spawn(pump.run(joins_rx));
                channel
            })
            .clone()
    }

    /// Register an observer for a task. Its first message is the task's
    /// current state.
    pub fn attach(&self, task_id: &str) -> Observer {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, messages) = mpsc::channel(self.config.observer_queue.max(1));

        let channel = loop {
            let channel = self.channel_for(task_id);
            let mut set = channel.lock();
            if !set.closed {
                set.slots.insert(id, Slot { sender, since: None });
                drop(set);
                break channel;
            }
            drop(set);
            forget(&self.channels, &channel);
        };
        let _ = channel.joins.send(id);

        tracing::debug!(task_id, observer = id, "observer attached");
        Observer {
            id,
            task_id: task_id.to_string(),
            messages,
        }
    }

    /// Deregister an observer. The last one out closes the upstream.
    pub fn detach(&self, task_id: &str, observer_id: u64) {
        let Some(channel) = self.lookup(task_id) else {
            return;
        };
        let remaining = {
            let mut set = channel.lock();
            set.slots.remove(&observer_id);
            channel.reap(&mut set)
        };
        tracing::debug!(task_id, observer = observer_id, "observer detached");
        if !remaining {
            tracing::debug!(task_id, "last observer left, closing upstream");
            forget(&self.channels, &channel);
        }
    }

    /// Reply to a frame an observer sent
    pub fn handle_client_message(&self, task_id: &str, observer_id: u64, text: &str) -> Option<ObserverMessage> {
        let reply = reply_to(task_id, text);
        if let Some(ObserverMessage::Error { message, .. }) = &reply {
            tracing::debug!(task_id, observer = observer_id, error = %message, "bad client frame");
        }
        reply
    }

    pub fn observer_count(&self, task_id: &str) -> usize {
        self.lookup(task_id).map(|c| c.lock().slots.len()).unwrap_or(0)
    }

    /// Whether an upstream pump is live for the task
    pub fn has_upstream(&self, task_id: &str) -> bool {
        self.lookup(task_id).map(|c| !c.lock().closed).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::source::Upstream;
    use crate::swarm::events::EventStatus;
    use crate::swarm::pipeline::{Pipeline, StageName};
    use crate::swarm::task::TaskStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio_stream::wrappers::UnboundedReceiverStream;

    type Frame = Result<String, UpstreamError>;

    #[derive(Default)]
    struct FakeSource {
        upstreams: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
        task_status: Mutex<Option<TaskStatus>>,
        subscribes: AtomicUsize,
        releases: AtomicUsize,
        refuse: AtomicBool,
    }

    impl FakeSource {
        fn running() -> Arc<Self> {
            let source = Self::default();
            *source.task_status.lock().unwrap() = Some(TaskStatus::Running);
            Arc::new(source)
        }

        fn push(&self, frame: Frame) {
            if let Some(upstream) = self.upstreams.lock().unwrap().last() {
                let _ = upstream.send(frame);
            }
        }

        fn event(&self, sequence: u64, progress: u8) {
            let event = ProgressEvent::stage(
                "t1",
                sequence,
                StageName::Validation,
                EventStatus::Running,
                progress,
                "working",
            );
            self.push(Ok(serde_json::to_string(&event).unwrap()));
        }

        fn disconnect(&self) {
            self.upstreams.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl ProgressSource for FakeSource {
        async fn subscribe(&self, _task_id: &str) -> Result<Upstream, UpstreamError> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(UpstreamError::Unavailable("refused".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            self.upstreams.lock().unwrap().push(tx);
            Ok(UnboundedReceiverStream::new(rx).boxed())
        }

        async fn snapshot(&self, task_id: &str) -> Option<Task> {
            let status = (*self.task_status.lock().unwrap())?;
            let mut task = Task::new(task_id, "Acme", &Pipeline::new(Vec::new()).unwrap());
            task.status = status;
            Some(task)
        }

        fn release(&self, _task_id: &str) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn next(observer: &mut Observer) -> Option<ObserverMessage> {
        tokio::time::timeout(Duration::from_secs(60), observer.recv())
            .await
            .expect("observer timed out")
    }

    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn sequence_of(message: &ObserverMessage) -> u64 {
        match message {
            ObserverMessage::Progress { sequence, .. } => *sequence,
            other => panic!("expected progress, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_observers_share_one_upstream() {
        let source = FakeSource::running();
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut first = relay.attach("t1");
        let mut second = relay.attach("t1");
        assert!(matches!(next(&mut first).await, Some(ObserverMessage::InitialState { .. })));
        assert!(matches!(next(&mut second).await, Some(ObserverMessage::InitialState { .. })));
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 1);

        for seq in 1..=3 {
            source.event(seq, seq as u8 * 10);
        }
        for seq in 1..=3 {
            assert_eq!(sequence_of(&next(&mut first).await.unwrap()), seq);
            assert_eq!(sequence_of(&next(&mut second).await.unwrap()), seq);
        }

        relay.detach("t1", first.id);
        source.event(4, 40);
        assert_eq!(sequence_of(&next(&mut second).await.unwrap()), 4);
        assert_eq!(relay.observer_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_last_detach_releases_and_reattach_resubscribes() {
        let source = FakeSource::running();
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut observer = relay.attach("t1");
        next(&mut observer).await;
        relay.detach("t1", observer.id);

        assert!(!relay.has_upstream("t1"));
        eventually(|| source.releases.load(Ordering::SeqCst) == 1).await;

        let mut observer = relay.attach("t1");
        assert!(matches!(next(&mut observer).await, Some(ObserverMessage::InitialState { .. })));
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 2);
        assert!(relay.has_upstream("t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_upstream_drop() {
        let source = FakeSource::running();
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut observer = relay.attach("t1");
        next(&mut observer).await;
        source.disconnect();

        assert!(matches!(
            next(&mut observer).await,
            Some(ObserverMessage::Error { recoverable: true, .. })
        ));
        assert!(matches!(next(&mut observer).await, Some(ObserverMessage::InitialState { .. })));
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 2);

        source.event(1, 10);
        assert_eq!(sequence_of(&next(&mut observer).await.unwrap()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_reconnect_attempts() {
        let source = FakeSource::running();
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut observer = relay.attach("t1");
        next(&mut observer).await;
        source.refuse.store(true, Ordering::SeqCst);
        source.disconnect();

        assert!(matches!(
            next(&mut observer).await,
            Some(ObserverMessage::Error { recoverable: true, .. })
        ));
        assert!(matches!(
            next(&mut observer).await,
            Some(ObserverMessage::Error { recoverable: false, .. })
        ));
        assert_eq!(next(&mut observer).await, None);
        // first subscribe plus four reconnects
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_raw_frames_and_completion() {
        let source = FakeSource::running();
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut observer = relay.attach("t1");
        next(&mut observer).await;

        source.push(Ok("not an event".to_string()));
        assert_eq!(
            next(&mut observer).await,
            Some(ObserverMessage::Raw {
                task_id: "t1".into(),
                payload: "not an event".into()
            })
        );

        let done = ProgressEvent::pipeline("t1", 17, EventStatus::Completed, 100, "Pipeline completed");
        source.push(Ok(serde_json::to_string(&done).unwrap()));
        assert!(matches!(
            next(&mut observer).await,
            Some(ObserverMessage::Completion { progress: 100, .. })
        ));
        assert_eq!(next(&mut observer).await, None);
        eventually(|| source.releases.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn test_slow_observer_dropped_without_blocking_others() {
        let source = FakeSource::running();
        let config = RelayConfig {
            observer_queue: 1,
            ..RelayConfig::default()
        };
        let relay = ProgressRelay::new(source.clone(), config);

        let mut slow = relay.attach("t1");
        let mut fast = relay.attach("t1");
        next(&mut fast).await;

        for seq in 1..=3 {
            source.event(seq, 10);
            assert_eq!(sequence_of(&next(&mut fast).await.unwrap()), seq);
        }

        assert!(matches!(next(&mut slow).await, Some(ObserverMessage::InitialState { .. })));
        assert_eq!(next(&mut slow).await, None);
        assert_eq!(relay.observer_count("t1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_finished_tasks() {
        let source = Arc::new(FakeSource::default());
        let relay = ProgressRelay::new(source.clone(), RelayConfig::default());

        let mut observer = relay.attach("t1");
        assert!(matches!(
            next(&mut observer).await,
            Some(ObserverMessage::Error { recoverable: false, .. })
        ));
        assert_eq!(next(&mut observer).await, None);

        *source.task_status.lock().unwrap() = Some(TaskStatus::Completed);
        let mut observer = relay.attach("t1");
        assert!(matches!(next(&mut observer).await, Some(ObserverMessage::InitialState { .. })));
        assert!(matches!(next(&mut observer).await, Some(ObserverMessage::Completion { .. })));
        assert_eq!(next(&mut observer).await, None);
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let relay = ProgressRelay::new(FakeSource::running(), RelayConfig::default());
        assert!(matches!(
            relay.handle_client_message("t1", 1, "ping"),
            Some(ObserverMessage::Pong { .. })
        ));
    }

    #[test]
    fn test_unsynced_observer_only_gets_final_error() {
        let (joins, _joins_rx) = mpsc::unbounded_channel();
        let channel = TaskChannel {
            task_id: "t1".to_string(),
            observers: Mutex::new(ObserverSet::default()),
            joins,
            shutdown: CancellationToken::new(),
        };
        let (synced_tx, mut synced) = mpsc::channel(8);
        let (pending_tx, mut pending) = mpsc::channel(8);
        {
            let mut set = channel.lock();
            set.slots.insert(1, Slot { sender: synced_tx, since: Some(3) });
            set.slots.insert(2, Slot { sender: pending_tx, since: None });
        }

        let raw = ObserverMessage::Raw {
            task_id: "t1".to_string(),
            payload: "heartbeat".to_string(),
        };
        channel.broadcast(&raw, None);
        channel.broadcast(&ObserverMessage::error("t1", "upstream interrupted", true), None);
        channel.broadcast(&ObserverMessage::error("t1", "upstream unavailable", false), None);

        assert!(matches!(synced.try_recv(), Ok(ObserverMessage::Raw { .. })));
        assert!(matches!(synced.try_recv(), Ok(ObserverMessage::Error { recoverable: true, .. })));
        assert!(matches!(synced.try_recv(), Ok(ObserverMessage::Error { recoverable: false, .. })));
        assert!(matches!(pending.try_recv(), Ok(ObserverMessage::Error { recoverable: false, .. })));
        assert!(pending.try_recv().is_err());
    }
}
