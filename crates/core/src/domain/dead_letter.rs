// Dead-Letter Domain Model

use crate::domain::item::QueueItem;
use serde::{Deserialize, Serialize};

/// Dead-letter entry ID (UUID v4)
pub type DeadLetterId = String;

/// Maximum number of context frames kept per entry
pub const MAX_CONTEXT_FRAMES: usize = 10;

/// Maximum length of a single context frame (chars)
pub const MAX_FRAME_LEN: usize = 512;

/// A failed item plus bounded error context. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: DeadLetterId,
    /// Queue the item was claimed from (replay target)
    pub queue_name: String,
    pub original_item: QueueItem,
    pub error_message: String,
    pub error_context: Vec<String>,
    /// Epoch ms
    pub failed_at: i64,
    /// Epoch ms
    pub expires_at: i64,
}

impl DeadLetterEntry {
    /// Build an entry, truncating the context to its bounds
    pub fn new(
        id: impl Into<String>,
        queue_name: impl Into<String>,
        original_item: QueueItem,
        error_message: impl Into<String>,
        error_context: impl IntoIterator<Item = String>,
        failed_at: i64,
        ttl_millis: i64,
    ) -> Self {
        Self {
            id: id.into(),
            queue_name: queue_name.into(),
            original_item,
            error_message: truncate_frame(error_message.into()),
            error_context: bound_context(error_context),
            failed_at,
            expires_at: failed_at.saturating_add(ttl_millis),
        }
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }
}

/// Keep the first `MAX_CONTEXT_FRAMES` frames, each cut to `MAX_FRAME_LEN`
pub fn bound_context(frames: impl IntoIterator<Item = String>) -> Vec<String> {
    frames
        .into_iter()
        .take(MAX_CONTEXT_FRAMES)
        .map(truncate_frame)
        .collect()
}

fn truncate_frame(frame: String) -> String {
    if frame.chars().count() <= MAX_FRAME_LEN {
        return frame;
    }
    frame.chars().take(MAX_FRAME_LEN).collect()
}
