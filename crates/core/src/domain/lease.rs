// Processing Lease Domain Model

use serde::{Deserialize, Serialize};

/// Time-bounded mutual-exclusion token over one queue's claim step.
///
/// At most one unexpired lease exists per queue. Only the holder
/// (matched by `holder_id`) may release it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLease {
    pub queue_name: String,
    pub holder_id: String,
    /// Epoch ms
    pub expires_at: i64,
}

impl ProcessingLease {
    pub fn new(queue_name: impl Into<String>, holder_id: impl Into<String>, expires_at: i64) -> Self {
        Self {
            queue_name: queue_name.into(),
            holder_id: holder_id.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }
}
