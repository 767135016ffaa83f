// Lease Store Port (Interface)

use crate::domain::ProcessingLease;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// "Set if absent, with expiry" over per-queue lease keys
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Take the lease for `queue_name` if nobody holds an unexpired one.
    ///
    /// Returns `None` when another holder owns it. Contention is not an error.
    async fn try_acquire(
        &self,
        queue_name: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<Option<ProcessingLease>>;

    /// Release the lease only if `lease.holder_id` still owns it.
    ///
    /// Returns false when the lease expired and was taken by someone else.
    async fn release(&self, lease: &ProcessingLease) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory lease table driven by an injected clock
    pub struct InMemoryLeaseStore {
        leases: Mutex<HashMap<String, ProcessingLease>>,
        time_provider: Arc<dyn TimeProvider>,
        acquisitions: AtomicUsize,
        failures: AtomicUsize,
    }

    impl InMemoryLeaseStore {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                leases: Mutex::new(HashMap::new()),
                time_provider,
                acquisitions: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
            }
        }

        /// Number of successful acquisitions so far
        pub fn acquisitions(&self) -> usize {
            self.acquisitions.load(Ordering::SeqCst)
        }

        /// Current holder of a queue's lease, if unexpired
        pub fn holder(&self, queue_name: &str) -> Option<String> {
            let now = self.time_provider.now_millis();
            self.leases
                .lock()
                .unwrap()
                .get(queue_name)
                .filter(|lease| !lease.is_expired(now))
                .map(|lease| lease.holder_id.clone())
        }

        /// Make the next `n` acquisitions fail with a database error
        pub fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LeaseStore for InMemoryLeaseStore {
        async fn try_acquire(
            &self,
            queue_name: &str,
            holder_id: &str,
            ttl: Duration,
        ) -> Result<Option<ProcessingLease>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Database("injected lease failure".to_string()));
            }

            let now = self.time_provider.now_millis();
            let mut leases = self.leases.lock().unwrap();

            if let Some(current) = leases.get(queue_name) {
                if !current.is_expired(now) {
                    return Ok(None);
                }
            }

            let lease = ProcessingLease::new(queue_name, holder_id, now + ttl.as_millis() as i64);
            leases.insert(queue_name.to_string(), lease.clone());
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            Ok(Some(lease))
        }

        async fn release(&self, lease: &ProcessingLease) -> Result<bool> {
            let mut leases = self.leases.lock().unwrap();
            match leases.get(&lease.queue_name) {
                Some(current) if current.holder_id == lease.holder_id => {
                    leases.remove(&lease.queue_name);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }
}
