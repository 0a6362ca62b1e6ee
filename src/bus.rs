//! Shared event primitives.
//!
//! The desktop runtime delivers task progress as push events on three named
//! channels. This module wraps that process-wide transport behind an explicit
//! bus owned by the composition root: subscribers hold a receiver, and
//! dropping the receiver is the unsubscribe.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const CHANNEL_LOG: &str = "task:log";
pub const CHANNEL_ANALYSIS: &str = "task:analysis";
pub const CHANNEL_PROGRESS: &str = "task:progress";

/// One event from the backend, tagged by its channel.
///
/// Delivery is FIFO per channel; no ordering is promised across channels.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A log line to be timestamped and appended to the console.
    Log(String),
    /// A chunk of streamed analysis text, to be concatenated.
    Analysis(String),
    /// Percentage complete. Values outside 0..=100 are ignored by consumers.
    Progress(i64),
}

impl TaskEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            TaskEvent::Log(_) => CHANNEL_LOG,
            TaskEvent::Analysis(_) => CHANNEL_ANALYSIS,
            TaskEvent::Progress(_) => CHANNEL_PROGRESS,
        }
    }

    /// Map a raw transport event onto a typed one. The backend emits progress
    /// as a float percentage, so both integer and float payloads are accepted.
    pub fn from_channel(channel: &str, payload: &serde_json::Value) -> Option<Self> {
        match channel {
            CHANNEL_LOG => payload.as_str().map(|s| TaskEvent::Log(s.to_string())),
            CHANNEL_ANALYSIS => payload
                .as_str()
                .map(|s| TaskEvent::Analysis(s.to_string())),
            CHANNEL_PROGRESS => payload
                .as_f64()
                .map(|p| TaskEvent::Progress(p.round() as i64)),
            _ => None,
        }
    }
}

/// Broadcast-style bus fanning task events out to current subscribers.
///
/// Cloning is cheap (the subscriber list lives behind an `Arc`). Subscribers
/// whose receivers have been dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<UnboundedSender<TaskEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Every event published after this point is
    /// delivered to the returned receiver until it is dropped.
    pub fn subscribe(&self) -> UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().expect("event bus lock poisoned").push(tx);
        rx
    }

    pub fn publish(&self, event: TaskEvent) {
        let mut senders = self.inner.lock().expect("event bus lock poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("event bus lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(TaskEvent::Log("first".into()));
        bus.publish(TaskEvent::Progress(10));
        bus.publish(TaskEvent::Log("second".into()));

        assert_eq!(rx.recv().await, Some(TaskEvent::Log("first".into())));
        assert_eq!(rx.recv().await, Some(TaskEvent::Progress(10)));
        assert_eq!(rx.recv().await, Some(TaskEvent::Log("second".into())));
    }

    #[tokio::test]
    async fn prunes_dropped_subscribers() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        bus.publish(TaskEvent::Log("hello".into()));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn maps_raw_channel_payloads() {
        let ev = TaskEvent::from_channel(CHANNEL_LOG, &serde_json::json!("downloading"));
        assert_eq!(ev, Some(TaskEvent::Log("downloading".into())));

        let ev = TaskEvent::from_channel(CHANNEL_PROGRESS, &serde_json::json!(42.6));
        assert_eq!(ev, Some(TaskEvent::Progress(43)));

        let ev = TaskEvent::from_channel("task:unknown", &serde_json::json!("x"));
        assert_eq!(ev, None);

        // Wrong payload type for the channel.
        let ev = TaskEvent::from_channel(CHANNEL_ANALYSIS, &serde_json::json!(7));
        assert_eq!(ev, None);
    }

    #[test]
    fn channel_names_round_trip() {
        assert_eq!(TaskEvent::Log(String::new()).channel(), "task:log");
        assert_eq!(TaskEvent::Analysis(String::new()).channel(), "task:analysis");
        assert_eq!(TaskEvent::Progress(0).channel(), "task:progress");
    }
}
