//! # Event Bus
//!
//! In-process publish/subscribe of progress events, one broadcast channel
//! per task. Channels exist only while someone is subscribed.

use super::events::ProgressEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish to the task's subscribers, returning how many received it.
    /// Without subscribers the event is dropped.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let sender = match self.channels.lock() {
            Ok(channels) => channels.get(&event.task_id).cloned(),
            Err(_) => None,
        };
        match sender {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to a task's events, creating its channel if needed
    pub fn subscribe(&self, task_id: &str) -> Option<broadcast::Receiver<ProgressEvent>> {
        let mut channels = self.channels.lock().ok()?;
        let sender = channels
            .entry(task_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Some(sender.subscribe())
    }

    /// Drop the task's channel once nobody listens anymore
    pub fn release(&self, task_id: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            if channels
                .get(task_id)
                .map(|s| s.receiver_count() == 0)
                .unwrap_or(false)
            {
                channels.remove(task_id);
            }
        }
    }

    /// Drop the task's channel unconditionally. Receivers drain what is
    /// buffered and then observe the end of the stream.
    pub fn close(&self, task_id: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(task_id);
        }
    }

    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|c| c.get(task_id).map(|s| s.receiver_count()))
            .unwrap_or(0)
    }

    pub fn has_channel(&self, task_id: &str) -> bool {
        self.channels
            .lock()
            .map(|c| c.contains_key(task_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::events::EventStatus;

    fn event(task_id: &str, sequence: u64) -> ProgressEvent {
        ProgressEvent::pipeline(task_id, sequence, EventStatus::Running, 0, "tick")
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(event("t1", 1)), 0);
        assert!(!bus.has_channel("t1"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe("t1").unwrap();
        bus.publish(event("t1", 1));
        bus.publish(event("t1", 2));
        bus.publish(event("t2", 1));

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_keeps_live_channels() {
        let bus = EventBus::default();
        let rx = bus.subscribe("t1").unwrap();
        bus.release("t1");
        assert!(bus.has_channel("t1"));

        drop(rx);
        bus.release("t1");
        assert!(!bus.has_channel("t1"));
    }

    #[tokio::test]
    async fn test_close_ends_stream_after_buffer() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe("t1").unwrap();
        bus.publish(event("t1", 1));
        bus.close("t1");

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
