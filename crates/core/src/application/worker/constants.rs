// Worker constants (no magic values)
use std::time::Duration;

/// Delay after a tick that found the queue empty (5s)
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(5);

/// Delay after a failed tick, below the escalation threshold (5s)
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Delay once consecutive failures reach the threshold (30s)
pub const DEFAULT_ESCALATED_BACKOFF: Duration = Duration::from_secs(30);

/// Consecutive failed ticks before the escalated backoff applies
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;

/// How often the supervisor looks for stalled loops (15s)
pub const DEFAULT_SUPERVISOR_INTERVAL: Duration = Duration::from_secs(15);

/// Dead-letter retention (7 days)
pub const DEFAULT_DEAD_LETTER_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Claim lease lifetime (5s)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
