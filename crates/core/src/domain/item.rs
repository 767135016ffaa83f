// Queue Item Domain Model

use serde::{Deserialize, Serialize};

/// Item ID (UUID v4)
pub type ItemId = String;

/// An opaque payload plus its envelope.
///
/// Owned by exactly one place at a time: the main queue, one worker's
/// in-flight batch, or the dead-letter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// Epoch ms at admission
    pub enqueued_at: i64,
    /// Producer name (e.g. the webhook provider)
    pub source: String,
    pub payload: serde_json::Value,
}

impl QueueItem {
    /// Create an item with injected ID and timestamp
    pub fn new(
        id: impl Into<String>,
        enqueued_at: i64,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            enqueued_at,
            source: source.into(),
            payload,
        }
    }

    /// Create a test item with deterministic ID and timestamp (for tests only)
    ///
    /// IDs are `item-1`, `item-2`, ...; timestamps start at 1000 and step by 1000.
    pub fn new_test(source: impl Into<String>, payload: serde_json::Value) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("item-{}", counter),
            (counter * 1000) as i64,
            source,
            payload,
        )
    }

    /// Serialize the item (envelope + payload) for storage
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize a stored item
    pub fn decode(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

/// A stored item before decoding.
///
/// `seq` is the store's monotonic position; FIFO order is ascending `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub seq: i64,
    pub body: String,
}

impl RawItem {
    pub fn new(seq: i64, body: impl Into<String>) -> Self {
        Self {
            seq,
            body: body.into(),
        }
    }

    pub fn decode(&self) -> serde_json::Result<QueueItem> {
        QueueItem::decode(&self.body)
    }
}
