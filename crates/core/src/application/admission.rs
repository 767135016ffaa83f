// Admission Control (backpressure at enqueue time)

use crate::domain::{ItemId, QueueItem, QueueRegistry};
use crate::error::{AppError, Result};
use crate::port::{EnqueueOutcome, IdProvider, QueueStore, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of an accepted admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub item_id: ItemId,
    /// Queue depth right after the append
    pub depth: u64,
}

/// Gates every enqueue against the queue's `max_depth`
///
/// The depth check and the push are one store transaction
/// (`QueueStore::enqueue_bounded`), so concurrent producers cannot overshoot.
pub struct AdmissionController {
    registry: Arc<QueueRegistry>,
    store: Arc<dyn QueueStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AdmissionController {
    pub fn new(
        registry: Arc<QueueRegistry>,
        store: Arc<dyn QueueStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            registry,
            store,
            id_provider,
            time_provider,
        }
    }

    /// Admit an already-built item.
    ///
    /// # Errors
    /// - `AppError::Backpressure` if the queue is at `max_depth` (nothing stored)
    /// - `AppError::Domain` if the queue is not configured
    /// - `AppError::Serialization` / `AppError::Database` from the store
    pub async fn admit(&self, queue_name: &str, item: &QueueItem) -> Result<Admitted> {
        let descriptor = self.registry.get(queue_name)?;

        match self.store.enqueue_bounded(descriptor, item).await? {
            EnqueueOutcome::Enqueued { depth } => {
                debug!(queue = %queue_name, item_id = %item.id, depth, "Item admitted");
                Ok(Admitted {
                    item_id: item.id.clone(),
                    depth,
                })
            }
            EnqueueOutcome::Full { depth } => {
                warn!(
                    queue = %queue_name,
                    item_id = %item.id,
                    depth,
                    max_depth = descriptor.max_depth,
                    "Backpressure: queue full, item rejected"
                );
                Err(AppError::Backpressure {
                    queue: queue_name.to_string(),
                    depth,
                    max_depth: descriptor.max_depth,
                })
            }
        }
    }

    /// Wrap a payload in a fresh envelope (injected ID and time) and admit it
    pub async fn admit_payload<T>(
        &self,
        queue_name: &str,
        source: &str,
        payload: &T,
    ) -> Result<Admitted>
    where
        T: Serialize + ?Sized + Sync,
    {
        let value = serde_json::to_value(payload).map_err(|e| {
            warn!(
                queue = %queue_name,
                source = %source,
                error = %e,
                "Payload not serializable, rejected"
            );
            AppError::from(e)
        })?;
        let item = QueueItem::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            source,
            value,
        );
        self.admit(queue_name, &item).await
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }
}
