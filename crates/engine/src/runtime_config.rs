// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Process-level configuration (`spec.md` §A.3): defaults layered with an
//! optional TOML file and `WEAVE_`-prefixed environment overrides, using
//! the same `figment` layering order as the rest of the Weave stack.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ENQUEUE_TIMEOUT, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_INPUT_POLL_TIMEOUT,
    DEFAULT_METRICS_REPUBLISH_INTERVAL, DEFAULT_METRICS_WINDOW, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SHUTDOWN_GRACE_PERIOD,
};
use crate::executor::ExecutorConfig;

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// The subset of `spec.md`'s defaults an operator may override at process
/// startup, expressed as plain numbers so they round-trip through TOML and
/// environment variables without `serde_with`-style duration helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bounded input-queue capacity per node (`spec.md` §4.4).
    pub queue_capacity: usize,
    /// Timeout in milliseconds before an interior node's input-poll
    /// re-checks the stop signal.
    pub input_poll_timeout_ms: u64,
    /// Timeout in milliseconds before a blocked enqueue publishes
    /// `queue.full` and retries.
    pub enqueue_timeout_ms: u64,
    /// Grace period in milliseconds the executor waits for node tasks to
    /// finish during shutdown.
    pub shutdown_grace_period_ms: u64,
    /// Bounded capacity of the event bus's internal dispatch queue.
    pub event_queue_capacity: usize,
    /// Rolling-window size for per-node metrics.
    pub metrics_window: usize,
    /// Republish interval in milliseconds for the metrics collector.
    pub metrics_republish_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            input_poll_timeout_ms: millis(DEFAULT_INPUT_POLL_TIMEOUT),
            enqueue_timeout_ms: millis(DEFAULT_ENQUEUE_TIMEOUT),
            shutdown_grace_period_ms: millis(DEFAULT_SHUTDOWN_GRACE_PERIOD),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            metrics_window: DEFAULT_METRICS_WINDOW,
            metrics_republish_interval_ms: millis(DEFAULT_METRICS_REPUBLISH_INTERVAL),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration by layering defaults, an optional TOML file at
    /// `config_path` (silently skipped if absent), and `WEAVE_`-prefixed
    /// environment variables, in that precedence order.
    ///
    /// # Errors
    ///
    /// Returns a `figment::Error` if the TOML file exists but is malformed,
    /// or if an environment override cannot be coerced into its field's
    /// type.
    pub fn load(config_path: &str) -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if std::path::Path::new(config_path).exists() {
            figment = figment.merge(Toml::file(config_path));
        }
        figment.merge(Env::prefixed("WEAVE_")).extract().map_err(Box::new)
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            queue_capacity: self.queue_capacity,
            input_poll_timeout: std::time::Duration::from_millis(self.input_poll_timeout_ms),
            enqueue_timeout: std::time::Duration::from_millis(self.enqueue_timeout_ms),
            shutdown_grace_period: std::time::Duration::from_millis(self.shutdown_grace_period_ms),
            ..ExecutorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_constants() {
        let config = RuntimeConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.event_queue_capacity, DEFAULT_EVENT_QUEUE_CAPACITY);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_is_missing() {
        let config = RuntimeConfig::load("/nonexistent/weave.toml").expect("defaults alone should load");
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn env_override_takes_precedence_over_defaults() {
        std::env::set_var("WEAVE_QUEUE_CAPACITY", "42");
        let config = RuntimeConfig::load("/nonexistent/weave.toml").expect("env-only override should load");
        std::env::remove_var("WEAVE_QUEUE_CAPACITY");
        assert_eq!(config.queue_capacity, 42);
    }
}
