// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The [`Event`] envelope published on the event bus (`spec.md` §4.5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Advisory delivery priority. Per `spec.md` §9's open-question resolution,
/// priority never reorders delivery or bypasses throttling; it is metadata
/// a subscriber may use to decide how urgently to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// An event published on the bus.
///
/// `topic` is a dot-separated path (`node.complete`, `graph.start`,
/// `data.branch`, ...) matched by subscribers via exact string, `*` (any
/// topic), or `prefix.*` (matched as `starts_with("prefix.")`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub data: serde_json::Value,
    pub source: String,
    pub timestamp: SystemTime,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    #[must_use]
    pub fn new(topic: impl Into<String>, source: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            data,
            source: source.into(),
            timestamp: SystemTime::now(),
            priority: Priority::default(),
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// A shareable, cheaply-cloned handle to an already-constructed event,
/// used when the same event is fanned out to multiple subscribers.
pub type SharedEvent = Arc<Event>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_is_normal() {
        let event = Event::new("node.start", "node-1", serde_json::json!({}));
        assert_eq!(event.priority, Priority::Normal);
    }

    #[test]
    fn priority_ordering_matches_severity() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
