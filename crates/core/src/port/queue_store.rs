// Queue Store Port (Interface)

use crate::domain::{QueueDescriptor, QueueItem, RawItem};
use crate::error::Result;
use async_trait::async_trait;

/// Result of a bounded append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Item appended; `depth` includes it
    Enqueued { depth: u64 },
    /// Queue at its ceiling; nothing was written
    Full { depth: u64 },
}

/// Durable named FIFO lists
///
/// Every operation is individually atomic; callers never lock around them.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Serialize and append at the tail, refreshing the queue TTL.
    /// Returns the depth after the append.
    async fn enqueue(&self, queue: &QueueDescriptor, item: &QueueItem) -> Result<u64>;

    /// Append only if depth < `queue.max_depth`.
    /// Check and push happen in a single transaction.
    async fn enqueue_bounded(&self, queue: &QueueDescriptor, item: &QueueItem)
        -> Result<EnqueueOutcome>;

    /// Current item count (expired queues count as empty)
    async fn depth(&self, queue_name: &str) -> Result<u64>;

    /// Inspect the head without removing it (diagnostics only)
    async fn peek(&self, queue_name: &str) -> Result<Option<QueueItem>>;

    /// Remove every item, returning how many were removed
    async fn flush(&self, queue_name: &str) -> Result<u64>;

    /// Atomically read and remove up to `max_items` from the head, in FIFO order.
    /// Bodies are returned undecoded.
    async fn take_head(&self, queue_name: &str, max_items: usize) -> Result<Vec<RawItem>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct QueueState {
        items: VecDeque<RawItem>,
        expires_at: i64,
    }

    /// In-memory queue store with TTL and failure injection
    pub struct InMemoryQueueStore {
        queues: Mutex<HashMap<String, QueueState>>,
        next_seq: Mutex<i64>,
        time_provider: Arc<dyn TimeProvider>,
        failures: AtomicUsize,
        split_take: bool,
    }

    impl InMemoryQueueStore {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                queues: Mutex::new(HashMap::new()),
                next_seq: Mutex::new(1),
                time_provider,
                failures: AtomicUsize::new(0),
                split_take: false,
            }
        }

        /// Model a store without a single-statement read-and-trim:
        /// `take_head` reads, yields to the runtime, then removes.
        /// Only the claim lease keeps concurrent takes apart.
        pub fn with_split_take(mut self) -> Self {
            self.split_take = true;
            self
        }

        /// Make the next `n` calls fail with a database error
        pub fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }

        /// Append a raw body as-is (e.g. a corrupt record)
        pub fn push_raw(&self, queue_name: &str, ttl_millis: i64, body: impl Into<String>) {
            let seq = self.next_seq();
            let now = self.time_provider.now_millis();
            let mut queues = self.queues.lock().unwrap();
            let state = queues.entry(queue_name.to_string()).or_default();
            state.items.push_back(RawItem::new(seq, body));
            state.expires_at = now + ttl_millis;
        }

        fn next_seq(&self) -> i64 {
            let mut seq = self.next_seq.lock().unwrap();
            let current = *seq;
            *seq += 1;
            current
        }

        fn check_failure(&self) -> Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Database("injected store failure".to_string()));
            }
            Ok(())
        }

        /// Drop the queue's items if its TTL has passed
        fn expire(state: &mut QueueState, now: i64) {
            if !state.items.is_empty() && now >= state.expires_at {
                state.items.clear();
            }
        }

        fn append(&self, queue: &QueueDescriptor, item: &QueueItem, bounded: bool) -> Result<EnqueueOutcome> {
            self.check_failure()?;
            let body = item.encode()?;
            let seq = self.next_seq();
            let now = self.time_provider.now_millis();

            let mut queues = self.queues.lock().unwrap();
            let state = queues.entry(queue.name.clone()).or_default();
            Self::expire(state, now);

            let depth = state.items.len() as u64;
            if bounded && depth >= queue.max_depth {
                return Ok(EnqueueOutcome::Full { depth });
            }

            state.items.push_back(RawItem::new(seq, body));
            state.expires_at = now + queue.ttl_millis();
            Ok(EnqueueOutcome::Enqueued { depth: depth + 1 })
        }
    }

    #[async_trait]
    impl QueueStore for InMemoryQueueStore {
        async fn enqueue(&self, queue: &QueueDescriptor, item: &QueueItem) -> Result<u64> {
            match self.append(queue, item, false)? {
                EnqueueOutcome::Enqueued { depth } | EnqueueOutcome::Full { depth } => Ok(depth),
            }
        }

        async fn enqueue_bounded(
            &self,
            queue: &QueueDescriptor,
            item: &QueueItem,
        ) -> Result<EnqueueOutcome> {
            self.append(queue, item, true)
        }

        async fn depth(&self, queue_name: &str) -> Result<u64> {
            self.check_failure()?;
            let now = self.time_provider.now_millis();
            let mut queues = self.queues.lock().unwrap();
            Ok(queues
                .get_mut(queue_name)
                .map(|state| {
                    Self::expire(state, now);
                    state.items.len() as u64
                })
                .unwrap_or(0))
        }

        async fn peek(&self, queue_name: &str) -> Result<Option<QueueItem>> {
            self.check_failure()?;
            let now = self.time_provider.now_millis();
            let mut queues = self.queues.lock().unwrap();
            let head = queues.get_mut(queue_name).and_then(|state| {
                Self::expire(state, now);
                state.items.front().cloned()
            });
            match head {
                Some(raw) => Ok(Some(raw.decode()?)),
                None => Ok(None),
            }
        }

        async fn flush(&self, queue_name: &str) -> Result<u64> {
            self.check_failure()?;
            let now = self.time_provider.now_millis();
            let mut queues = self.queues.lock().unwrap();
            Ok(queues
                .remove(queue_name)
                .map(|mut state| {
                    Self::expire(&mut state, now);
                    state.items.len() as u64
                })
                .unwrap_or(0))
        }

        async fn take_head(&self, queue_name: &str, max_items: usize) -> Result<Vec<RawItem>> {
            self.check_failure()?;
            let now = self.time_provider.now_millis();

            if !self.split_take {
                let mut queues = self.queues.lock().unwrap();
                let Some(state) = queues.get_mut(queue_name) else {
                    return Ok(Vec::new());
                };
                Self::expire(state, now);
                let n = max_items.min(state.items.len());
                return Ok(state.items.drain(..n).collect());
            }

            let head: Vec<RawItem> = {
                let mut queues = self.queues.lock().unwrap();
                match queues.get_mut(queue_name) {
                    Some(state) => {
                        Self::expire(state, now);
                        state.items.iter().take(max_items).cloned().collect()
                    }
                    None => Vec::new(),
                }
            };

            tokio::task::yield_now().await;

            let mut queues = self.queues.lock().unwrap();
            if let Some(state) = queues.get_mut(queue_name) {
                state
                    .items
                    .retain(|raw| !head.iter().any(|taken| taken.seq == raw.seq));
            }
            Ok(head)
        }
    }
}
