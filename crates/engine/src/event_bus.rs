// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Event Bus (`spec.md` §4.5): topic-based pub-sub with wildcard
//! subscriptions, per-topic throttling, and a non-blocking publish path
//! that never stalls the node publishing an event.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use weave_core::{Event, SharedEvent};

use crate::constants::{ThrottleConfig, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_THROTTLE_TABLE};

/// Returns whether `topic` matches `pattern`: an exact string match, the
/// bare wildcard `*` (matches everything), or `prefix.*` (matches any topic
/// starting with `prefix.`), per `spec.md` §4.5/§9.
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return topic == prefix || topic.starts_with(&format!("{prefix}."));
    }
    pattern == topic
}

struct Subscription {
    pattern: String,
    sender: mpsc::Sender<SharedEvent>,
    mode: DeliveryMode,
}

struct ThrottleState {
    window_start: Instant,
    count_in_window: u32,
}

/// Sliding-window throttle: at most `max_events` per `interval`, reset once
/// the window elapses (`spec.md` §4.5).
struct Throttler {
    table: HashMap<&'static str, ThrottleConfig>,
    state: Mutex<HashMap<&'static str, ThrottleState>>,
}

impl Throttler {
    fn new(table: &[ThrottleConfig]) -> Self {
        Self { table: table.iter().map(|t| (t.topic, *t)).collect(), state: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if an event on `topic` should be delivered now.
    /// Topics absent from the table are never throttled.
    fn allow(&self, topic: &str) -> bool {
        let Some(config) = self.table.get(topic) else { return true };
        let mut state = self.state.lock().expect("throttle state mutex poisoned");
        let entry = state.get_mut(config.topic);
        let now = Instant::now();
        match entry {
            Some(s) if now.duration_since(s.window_start) < config.interval => {
                if s.count_in_window < config.max_events {
                    s.count_in_window += 1;
                    true
                } else {
                    false
                }
            },
            _ => {
                state.insert(config.topic, ThrottleState { window_start: now, count_in_window: 1 });
                true
            },
        }
    }
}

/// Per-subscriber delivery mode (`spec.md` §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The dispatcher `try_send`s; a lagging subscriber drops events rather
    /// than blocking the publisher.
    Async,
    /// The dispatcher `send`s (awaits capacity); used by subscribers that
    /// must not miss an event, at the cost of applying backpressure to the
    /// dispatch loop.
    Sync,
}

enum DispatchTask {
    Publish(SharedEvent),
}

/// The process-wide event bus. `publish` is non-blocking from the caller's
/// perspective: it hands the event to an internal dispatch task over a
/// bounded channel and returns immediately.
pub struct EventBus {
    dispatch_tx: mpsc::Sender<DispatchTask>,
    subscriptions: std::sync::Arc<Mutex<Vec<Subscription>>>,
}

impl EventBus {
    /// Spawns the bus's dispatcher task using the default queue capacity
    /// and throttle table (`spec.md` §4.5, defaults resolved in
    /// [`crate::constants`]).
    #[must_use]
    pub fn spawn() -> Self {
        Self::spawn_with(DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_THROTTLE_TABLE)
    }

    #[must_use]
    pub fn spawn_with(queue_capacity: usize, throttle_table: &[ThrottleConfig]) -> Self {
        let (dispatch_tx, mut dispatch_rx) = mpsc::channel(queue_capacity);
        let subscriptions: std::sync::Arc<Mutex<Vec<Subscription>>> =
            std::sync::Arc::new(Mutex::new(Vec::new()));
        let throttler = Throttler::new(throttle_table);
        let bus_subscriptions = subscriptions.clone();

        tokio::spawn(async move {
            while let Some(DispatchTask::Publish(event)) = dispatch_rx.recv().await {
                if !throttler.allow(&event.topic) {
                    continue;
                }
                let targets: Vec<(mpsc::Sender<SharedEvent>, DeliveryMode)> = bus_subscriptions
                    .lock()
                    .expect("subscriptions mutex poisoned")
                    .iter()
                    .filter(|sub| topic_matches(&sub.pattern, &event.topic))
                    .map(|sub| (sub.sender.clone(), sub.mode))
                    .collect();

                for (target, mode) in targets {
                    match mode {
                        // A lagging async subscriber drops events rather
                        // than stalling delivery to the others
                        // (`spec.md` §4.5 subscriber isolation).
                        DeliveryMode::Async => {
                            let _ = target.try_send(event.clone());
                        },
                        // A sync subscriber applies backpressure to the
                        // dispatch loop instead of missing the event.
                        DeliveryMode::Sync => {
                            let _ = target.send(event.clone()).await;
                        },
                    }
                }
            }
        });

        Self { dispatch_tx, subscriptions }
    }

    /// Subscribes to `pattern` (exact topic, `*`, or `prefix.*`) with
    /// [`DeliveryMode::Async`], returning a receiver bounded at `capacity`.
    #[must_use]
    pub fn subscribe(&self, pattern: impl Into<String>, capacity: usize) -> mpsc::Receiver<SharedEvent> {
        self.subscribe_with_mode(pattern, capacity, DeliveryMode::Async)
    }

    /// Subscribes to `pattern` with an explicit [`DeliveryMode`]
    /// (`spec.md` §4.5).
    #[must_use]
    pub fn subscribe_with_mode(
        &self,
        pattern: impl Into<String>,
        capacity: usize,
        mode: DeliveryMode,
    ) -> mpsc::Receiver<SharedEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscriptions
            .lock()
            .expect("subscriptions mutex poisoned")
            .push(Subscription { pattern: pattern.into(), sender: tx, mode });
        rx
    }

    /// Publishes `event`. Never blocks the caller: if the dispatcher's
    /// queue is momentarily full the event is dropped, matching the
    /// non-blocking-publisher design note in `spec.md` §9.
    pub fn publish(&self, event: Event) {
        let _ = self.dispatch_tx.try_send(DispatchTask::Publish(std::sync::Arc::new(event)));
    }

    /// Blocking publish variant for call sites that would rather apply
    /// backpressure than silently drop (e.g. a final `graph.complete`).
    pub async fn publish_sync(&self, event: Event) {
        let _ = self.dispatch_tx.send(DispatchTask::Publish(std::sync::Arc::new(event))).await;
    }
}

/// Convenience helper mirroring [`DeliveryMode`]'s intent at a call site:
/// awaits a bit past `interval` so throttle windows reliably reset in
/// tests.
#[cfg(test)]
async fn past_window(interval: Duration) {
    tokio::time::sleep(interval + Duration::from_millis(5)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(topic_matches("node.complete", "node.complete"));
        assert!(!topic_matches("node.complete", "node.error"));
    }

    #[test]
    fn bare_wildcard_matches_everything() {
        assert!(topic_matches("*", "anything.at.all"));
    }

    #[test]
    fn prefix_wildcard_matches_startswith() {
        assert!(topic_matches("node.*", "node.complete"));
        assert!(topic_matches("node.*", "node.error"));
        assert!(!topic_matches("node.*", "graph.start"));
        assert!(topic_matches("node.*", "node"));
    }

    #[tokio::test]
    async fn exact_subscription_receives_matching_publish() {
        let bus = EventBus::spawn();
        let mut rx = bus.subscribe("node.complete", 8);
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({})));
        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.topic, "node.complete");
    }

    #[tokio::test]
    async fn wildcard_subscription_receives_prefixed_topics() {
        let bus = EventBus::spawn();
        let mut rx = bus.subscribe("node.*", 8);
        bus.publish(Event::new("node.error", "n1", serde_json::json!({})));
        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.topic, "node.error");
    }

    #[tokio::test]
    async fn unrelated_topic_is_not_delivered() {
        let bus = EventBus::spawn();
        let mut rx = bus.subscribe("graph.start", 8);
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({})));
        let outcome = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(outcome.is_err(), "no event should have arrived on an unrelated topic");
    }

    #[tokio::test]
    async fn sync_subscriber_backpressures_instead_of_dropping() {
        let bus = EventBus::spawn();
        let mut rx = bus.subscribe_with_mode("node.complete", 1, DeliveryMode::Sync);
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({ "i": 1 })));
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({ "i": 2 })));

        let first = rx.recv().await.expect("first event delivered");
        assert_eq!(first.data["i"], 1);
        let second = rx.recv().await.expect("second event delivered, not dropped");
        assert_eq!(second.data["i"], 2);
    }

    #[tokio::test]
    async fn throttle_drops_events_beyond_the_per_window_limit() {
        let table =
            [ThrottleConfig { topic: "node.complete", interval: Duration::from_millis(50), max_events: 1 }];
        let bus = EventBus::spawn_with(16, &table);
        let mut rx = bus.subscribe("node.complete", 16);

        bus.publish(Event::new("node.complete", "n1", serde_json::json!({})));
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({})));

        let first = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(first.is_ok(), "first event within the window should arrive");

        let second = tokio::time::timeout(Duration::from_millis(30), rx.recv()).await;
        assert!(second.is_err(), "second event within the same window should be throttled");

        past_window(Duration::from_millis(50)).await;
        bus.publish(Event::new("node.complete", "n1", serde_json::json!({})));
        let third = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(third.is_ok(), "event in a new window should arrive");
    }
}
