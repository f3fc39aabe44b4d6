//! Lock event fan-out
//!
//! Every UI surface subscribes once and receives every lock event on its own
//! channel. Subscribers that have gone away are dropped on the next send.

use std::sync::mpsc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Why the vault locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockReason {
    Manual,
    Idle,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockEvent {
    pub reason: LockReason,
    pub at: DateTime<Utc>,
}

impl LockEvent {
    pub fn new(reason: LockReason) -> Self {
        Self {
            reason,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LockBroadcaster {
    subscribers: Vec<mpsc::Sender<LockEvent>>,
}

impl LockBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<LockEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Send `event` to every live subscriber
    pub fn broadcast(&mut self, event: LockEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        debug!(reason = ?event.reason, subscribers = self.subscribers.len(), "Broadcast lock event");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let mut broadcaster = LockBroadcaster::new();
        let first = broadcaster.subscribe();
        let second = broadcaster.subscribe();

        broadcaster.broadcast(LockEvent::new(LockReason::Idle));

        assert_eq!(first.try_recv().unwrap().reason, LockReason::Idle);
        assert_eq!(second.try_recv().unwrap().reason, LockReason::Idle);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut broadcaster = LockBroadcaster::new();
        let kept = broadcaster.subscribe();
        drop(broadcaster.subscribe());

        broadcaster.broadcast(LockEvent::new(LockReason::Manual));

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
