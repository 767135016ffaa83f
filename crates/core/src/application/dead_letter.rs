// Dead-Letter Routing for per-item failures

use crate::domain::{DeadLetterEntry, QueueItem};
use crate::port::{DeadLetterStore, HandlerError, IdProvider, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Records failed items with bounded error context
///
/// Failed items are NOT requeued; an operator replays them from the
/// dead-letter store (see `DeadLetterReplayer`).
pub struct DeadLetterRouter {
    store: Arc<dyn DeadLetterStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    ttl: Duration,
}

impl DeadLetterRouter {
    pub fn new(
        store: Arc<dyn DeadLetterStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            id_provider,
            time_provider,
            ttl,
        }
    }

    /// Append a dead-letter entry for `item`.
    ///
    /// Never returns an error: a store failure is logged and reported as
    /// `false` so the caller's batch keeps going.
    pub async fn route_failure(&self, queue_name: &str, item: &QueueItem, err: &HandlerError) -> bool {
        let entry = DeadLetterEntry::new(
            self.id_provider.generate_id(),
            queue_name,
            item.clone(),
            err.message.clone(),
            err.context.iter().cloned(),
            self.time_provider.now_millis(),
            self.ttl.as_millis() as i64,
        );

        match self.store.append(&entry).await {
            Ok(()) => {
                warn!(
                    queue = %queue_name,
                    item_id = %item.id,
                    dead_letter_id = %entry.id,
                    error = %err.message,
                    "Item dead-lettered"
                );
                true
            }
            Err(e) => {
                error!(
                    queue = %queue_name,
                    item_id = %item.id,
                    handler_error = %err.message,
                    error = %e,
                    "Failed to record dead-letter entry; item lost"
                );
                false
            }
        }
    }
}
