// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The error/retry strategy table from `spec.md` §4.4.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The process-wide strategy applied when a node's `run()` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Publish `node.error`; signal global stop; drain and exit all tasks.
    CircuitBreak,
    /// Publish `node.error`; drop this packet; continue.
    Skip,
    /// Retry up to `max_retries` times with exponential backoff
    /// `base_delay · 2^attempt`; on final failure publish `node.error` and
    /// apply `skip`.
    Retry { max_retries: u32, base_delay_ms: u64 },
    /// Publish `node.restarting`; call `cleanup()` then `initialize()`;
    /// resume loop. The packet that triggered the failure is dropped.
    Restart,
}

impl ErrorStrategy {
    /// The `base_delay · 2^attempt` backoff formula named in `spec.md` §4.4.
    ///
    /// Only meaningful for [`Self::Retry`]; other variants return
    /// `Duration::ZERO`.
    #[must_use]
    pub fn backoff_delay(self, attempt: u32) -> Duration {
        match self {
            Self::Retry { base_delay_ms, .. } => {
                let multiplier = 2u64.saturating_pow(attempt);
                Duration::from_millis(base_delay_ms.saturating_mul(multiplier))
            },
            Self::CircuitBreak | Self::Skip | Self::Restart => Duration::ZERO,
        }
    }
}

impl Default for ErrorStrategy {
    fn default() -> Self {
        Self::Retry { max_retries: 3, base_delay_ms: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let strategy = ErrorStrategy::Retry { max_retries: 5, base_delay_ms: 100 };
        assert_eq!(strategy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn non_retry_strategies_have_no_backoff() {
        assert_eq!(ErrorStrategy::Skip.backoff_delay(2), Duration::ZERO);
        assert_eq!(ErrorStrategy::CircuitBreak.backoff_delay(2), Duration::ZERO);
    }
}
