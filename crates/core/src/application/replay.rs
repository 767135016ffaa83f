// Dead-Letter Replay (operator-driven)

use crate::application::{Admitted, AdmissionController};
use crate::domain::DeadLetterId;
use crate::error::{AppError, Result};
use crate::port::DeadLetterStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a bulk replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Entry IDs re-admitted and removed, in replay order
    pub replayed: Vec<DeadLetterId>,
    /// Replay stopped because the target queue was full
    pub stopped_on_backpressure: bool,
}

/// Re-admits dead-lettered items into the queue they failed from.
///
/// The item goes back through admission (and its depth bound) unchanged,
/// keeping its original ID. The entry is removed only after admission
/// succeeds; a crash in between replays the item twice rather than losing it.
pub struct DeadLetterReplayer {
    store: Arc<dyn DeadLetterStore>,
    admission: Arc<AdmissionController>,
}

impl DeadLetterReplayer {
    pub fn new(store: Arc<dyn DeadLetterStore>, admission: Arc<AdmissionController>) -> Self {
        Self { store, admission }
    }

    /// Replay a single entry.
    ///
    /// # Errors
    /// - `AppError::NotFound` if the entry does not exist or has expired
    /// - `AppError::Backpressure` if its queue is full (entry kept)
    pub async fn replay(&self, entry_id: &str) -> Result<Admitted> {
        let entry = self
            .store
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("dead-letter entry {}", entry_id)))?;

        let admitted = self
            .admission
            .admit(&entry.queue_name, &entry.original_item)
            .await?;

        if let Err(e) = self.store.remove(&entry.id).await {
            warn!(
                dead_letter_id = %entry.id,
                error = %e,
                "Replayed entry could not be removed; it may be replayed again"
            );
        }

        info!(
            dead_letter_id = %entry.id,
            queue = %entry.queue_name,
            item_id = %admitted.item_id,
            depth = admitted.depth,
            "Dead-letter entry replayed"
        );
        Ok(admitted)
    }

    /// Replay up to `limit` entries of one queue, oldest first.
    ///
    /// Stops at the first backpressure rejection; other errors abort the run.
    pub async fn replay_queue(&self, queue_name: &str, limit: usize) -> Result<ReplayReport> {
        // Unknown queues fail here rather than per entry
        self.admission.registry().get(queue_name)?;

        let entries = self.store.list(Some(queue_name), limit).await?;
        let mut report = ReplayReport::default();

        for entry in entries {
            match self.replay(&entry.id).await {
                Ok(_) => report.replayed.push(entry.id),
                Err(AppError::Backpressure { depth, .. }) => {
                    warn!(
                        queue = %queue_name,
                        depth,
                        replayed = report.replayed.len(),
                        "Replay stopped: queue full"
                    );
                    report.stopped_on_backpressure = true;
                    break;
                }
                // Expired or removed concurrently
                Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeadLetterEntry, QueueDescriptor, QueueItem, QueueRegistry};
    use crate::port::dead_letter_store::mocks::InMemoryDeadLetterStore;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::queue_store::mocks::InMemoryQueueStore;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::{QueueStore, TimeProvider};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        replayer: DeadLetterReplayer,
        dead_letters: Arc<InMemoryDeadLetterStore>,
        queue: Arc<InMemoryQueueStore>,
        clock: Arc<ManualTimeProvider>,
    }

    fn fixture(max_depth: u64) -> Fixture {
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let queue = Arc::new(InMemoryQueueStore::new(clock.clone()));
        let dead_letters = Arc::new(InMemoryDeadLetterStore::new(clock.clone()));
        let registry = Arc::new(
            QueueRegistry::new(vec![QueueDescriptor::new(
                "Q",
                max_depth,
                2,
                Duration::from_secs(3600),
                Duration::from_secs(5),
            )])
            .unwrap(),
        );
        let admission = Arc::new(AdmissionController::new(
            registry,
            queue.clone(),
            Arc::new(SequentialIdProvider::new("item")),
            clock.clone(),
        ));
        Fixture {
            replayer: DeadLetterReplayer::new(dead_letters.clone(), admission),
            dead_letters,
            queue,
            clock,
        }
    }

    async fn dead_letter(f: &Fixture, id: &str, payload: &str) {
        f.clock.advance(1);
        let entry = DeadLetterEntry::new(
            id,
            "Q",
            QueueItem::new_test("test", json!(payload)),
            "boom",
            Vec::new(),
            f.clock.now_millis(),
            60_000,
        );
        f.dead_letters.append(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_replay_readmits_and_removes_entry() {
        let f = fixture(10);
        dead_letter(&f, "dl-1", "B").await;

        let admitted = f.replayer.replay("dl-1").await.unwrap();
        assert_eq!(admitted.depth, 1);

        let head = f.queue.peek("Q").await.unwrap().unwrap();
        assert_eq!(head.payload, json!("B"));
        assert!(f.dead_letters.find_by_id("dl-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replay_unknown_entry_is_not_found() {
        let f = fixture(10);
        let err = f.replayer.replay("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_replay_into_full_queue_keeps_entry() {
        let f = fixture(1);
        dead_letter(&f, "dl-1", "B").await;
        dead_letter(&f, "dl-2", "C").await;

        f.replayer.replay("dl-1").await.unwrap();
        let err = f.replayer.replay("dl-2").await.unwrap_err();

        assert!(err.is_backpressure());
        assert!(f.dead_letters.find_by_id("dl-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replay_queue_oldest_first_stops_when_full() {
        let f = fixture(2);
        dead_letter(&f, "dl-1", "A").await;
        dead_letter(&f, "dl-2", "B").await;
        dead_letter(&f, "dl-3", "C").await;

        let report = f.replayer.replay_queue("Q", 10).await.unwrap();
        assert_eq!(report.replayed, vec!["dl-1".to_string(), "dl-2".to_string()]);
        assert!(report.stopped_on_backpressure);
        assert_eq!(f.dead_letters.count(Some("Q")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_queue_respects_limit() {
        let f = fixture(10);
        dead_letter(&f, "dl-1", "A").await;
        dead_letter(&f, "dl-2", "B").await;

        let report = f.replayer.replay_queue("Q", 1).await.unwrap();
        assert_eq!(report.replayed, vec!["dl-1".to_string()]);
        assert!(!report.stopped_on_backpressure);
        assert_eq!(f.queue.depth("Q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_queue_unknown_queue() {
        let f = fixture(10);
        assert!(f.replayer.replay_queue("nope", 10).await.is_err());
    }
}
