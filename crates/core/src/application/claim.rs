// Batch Claiming under a per-queue lease

use crate::domain::{QueueItem, QueueRegistry};
use crate::error::Result;
use crate::port::{LeaseStore, QueueStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Items taken from the head in one claim
#[derive(Debug, Default)]
pub struct ClaimedBatch {
    pub items: Vec<QueueItem>,
    /// Bodies removed from the queue that could not be decoded
    pub dropped: usize,
}

/// Removes batches from the head of a queue, one claimer at a time per queue
///
/// Algorithm:
/// 1. Empty queue: return `[]` without touching the lease
/// 2. Acquire the queue's lease (`lock_timeout`); if held elsewhere return `[]`
/// 3. `take_head` (read + trim in one transaction)
/// 4. Release the lease; processing happens outside it
/// 5. Decode each body, dropping undecodable ones
///
/// Claimed items exist only in the caller's batch until handled or
/// dead-lettered; a process that dies in between loses them (at-most-once).
pub struct BatchClaimer {
    registry: Arc<QueueRegistry>,
    store: Arc<dyn QueueStore>,
    leases: Arc<dyn LeaseStore>,
}

impl BatchClaimer {
    pub fn new(
        registry: Arc<QueueRegistry>,
        store: Arc<dyn QueueStore>,
        leases: Arc<dyn LeaseStore>,
    ) -> Self {
        Self {
            registry,
            store,
            leases,
        }
    }

    /// Claim up to `batch_size` items for `holder_id`.
    ///
    /// Never blocks on other claimers: lease contention yields an empty batch.
    ///
    /// # Errors
    /// Store or lease-mechanics failures (`AppError::Database`) and unknown queues.
    pub async fn claim(
        &self,
        queue_name: &str,
        batch_size: usize,
        holder_id: &str,
    ) -> Result<Vec<QueueItem>> {
        Ok(self.claim_batch(queue_name, batch_size, holder_id).await?.items)
    }

    /// Same as [`claim`](Self::claim), also reporting how many taken
    /// bodies failed to decode and were dropped.
    pub async fn claim_batch(
        &self,
        queue_name: &str,
        batch_size: usize,
        holder_id: &str,
    ) -> Result<ClaimedBatch> {
        let descriptor = self.registry.get(queue_name)?;

        if batch_size == 0 || self.store.depth(queue_name).await? == 0 {
            return Ok(ClaimedBatch::default());
        }

        let lease = match self
            .leases
            .try_acquire(queue_name, holder_id, descriptor.lock_timeout)
            .await?
        {
            Some(lease) => lease,
            None => {
                debug!(queue = %queue_name, holder = %holder_id, "Claim lease held elsewhere, skipping");
                return Ok(ClaimedBatch::default());
            }
        };

        let taken = self.store.take_head(queue_name, batch_size).await;

        match self.leases.release(&lease).await {
            Ok(true) => {}
            Ok(false) => warn!(
                queue = %queue_name,
                holder = %holder_id,
                "Claim lease expired before release"
            ),
            Err(e) => warn!(
                queue = %queue_name,
                holder = %holder_id,
                error = %e,
                "Failed to release claim lease (it will expire)"
            ),
        }

        let raw_items = taken?;
        let mut batch = ClaimedBatch {
            items: Vec::with_capacity(raw_items.len()),
            dropped: 0,
        };
        for raw in raw_items {
            match raw.decode() {
                Ok(item) => batch.items.push(item),
                Err(e) => {
                    batch.dropped += 1;
                    warn!(
                        queue = %queue_name,
                        seq = raw.seq,
                        error = %e,
                        "Dropping undecodable item from batch"
                    );
                }
            }
        }

        debug!(
            queue = %queue_name,
            holder = %holder_id,
            claimed = batch.items.len(),
            dropped = batch.dropped,
            "Batch claimed"
        );
        Ok(batch)
    }
}
