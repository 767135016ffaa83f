// Reschedule delay policy

use super::constants::*;
use super::TickOutcome;
use std::time::Duration;

/// Maps a tick's outcome to the delay before the next tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReschedulePolicy {
    pub idle_delay: Duration,
    pub error_backoff: Duration,
    pub escalated_backoff: Duration,
    /// Consecutive failures at which `escalated_backoff` takes over
    pub escalation_threshold: u32,
}

impl Default for ReschedulePolicy {
    fn default() -> Self {
        Self {
            idle_delay: DEFAULT_IDLE_DELAY,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            escalated_backoff: DEFAULT_ESCALATED_BACKOFF,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }
}

impl ReschedulePolicy {
    /// - work done: zero (drain while items are available)
    /// - empty queue: `idle_delay`
    /// - failure: `error_backoff`, or `escalated_backoff` once
    ///   `consecutive_errors >= escalation_threshold`
    pub fn next_delay(&self, outcome: &TickOutcome, consecutive_errors: u32) -> Duration {
        match outcome {
            TickOutcome::Processed { .. } => Duration::ZERO,
            TickOutcome::Empty => self.idle_delay,
            TickOutcome::Failed(_) => {
                if consecutive_errors >= self.escalation_threshold {
                    self.escalated_backoff
                } else {
                    self.error_backoff
                }
            }
        }
    }

    /// Longest delay this policy can produce
    pub fn max_delay(&self) -> Duration {
        self.idle_delay
            .max(self.error_backoff)
            .max(self.escalated_backoff)
    }
}
