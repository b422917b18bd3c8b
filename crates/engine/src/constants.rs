// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Canonical default values for the graph model, executor, event bus, and
//! metrics collector. `RuntimeConfig` (see [`crate::runtime_config`]) may
//! override each of these; code elsewhere should reference these constants
//! rather than repeating the numbers.

use std::time::Duration;

/// Default bounded input-queue capacity `Q` per node (`spec.md` §4.4).
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default timeout when an interior node awaits its input queue, used
/// purely so the loop can re-check the stop signal (`spec.md` §4.4, §5).
pub const DEFAULT_INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default timeout for a blocking enqueue before `queue.full` is published
/// (`spec.md` §4.4 "Backpressure policy" — "default matches input-poll
/// timeout").
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = DEFAULT_INPUT_POLL_TIMEOUT;

/// Default grace period the executor waits for tasks to finish during
/// shutdown before abandoning them (`spec.md` §4.4, §5).
pub const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Byte-size threshold above which a branch destination prefers a deep
/// copy over a shallow one, resolved from `original_source/
/// service_DAG/engine/cow_manager.py`'s `deep_copy_threshold` (1 MiB).
pub const DEFAULT_DEEP_COPY_THRESHOLD_BYTES: usize = 1024 * 1024;

/// Branch-count threshold above which fan-out prefers deep copies even for
/// payloads under the byte threshold, resolved from the same module's
/// `max_branches_for_shallow_copy`.
pub const DEFAULT_MAX_SHALLOW_BRANCHES: usize = 3;

/// Default bounded capacity of the event bus's internal dispatch queue,
/// resolved from `original_source/service_DAG/core/async_event_bus.py`'s
/// `asyncio.Queue(maxsize=1000)`.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1000;

/// Default rolling-window size for per-node runtime statistics
/// (`spec.md` §4.6, "rolling window of last N (default 100) runtimes").
pub const DEFAULT_METRICS_WINDOW: usize = 100;

/// Default republish interval for the metrics collector's periodic task
/// (`spec.md` §4.6, "default 1 Hz").
pub const DEFAULT_METRICS_REPUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// A single topic's throttle policy: at most `max_events` deliveries per
/// sliding window of `interval` (`spec.md` §4.5).
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub topic: &'static str,
    pub interval: Duration,
    pub max_events: u32,
}

/// Default per-topic throttle table, resolved from `original_source/
/// service_DAG/core/async_event_bus.py`'s `ThrottleConfig` table.
pub const DEFAULT_THROTTLE_TABLE: &[ThrottleConfig] = &[
    ThrottleConfig { topic: "node.complete", interval: Duration::from_millis(100), max_events: 10 },
    ThrottleConfig { topic: "node.performance", interval: Duration::from_millis(1000), max_events: 1 },
    ThrottleConfig { topic: "queue.status", interval: Duration::from_millis(500), max_events: 5 },
    ThrottleConfig { topic: "data.branch", interval: Duration::from_millis(100), max_events: 20 },
];
