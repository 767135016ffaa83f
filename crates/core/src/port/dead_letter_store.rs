// Dead-Letter Store Port (Interface)

use crate::domain::DeadLetterEntry;
use crate::error::Result;
use async_trait::async_trait;

/// Shared append-only collection of failed items
///
/// Expired entries are invisible to reads and removed by maintenance.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Append an entry (never overwrites)
    async fn append(&self, entry: &DeadLetterEntry) -> Result<()>;

    /// Find an unexpired entry by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<DeadLetterEntry>>;

    /// List unexpired entries oldest-first, optionally for one queue
    async fn list(&self, queue_name: Option<&str>, limit: usize) -> Result<Vec<DeadLetterEntry>>;

    /// Delete an entry after replay. Returns false if it was already gone.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Count unexpired entries, optionally for one queue
    async fn count(&self, queue_name: Option<&str>) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory dead-letter list
    pub struct InMemoryDeadLetterStore {
        entries: Mutex<Vec<DeadLetterEntry>>,
        time_provider: Arc<dyn TimeProvider>,
        unavailable: AtomicBool,
    }

    impl InMemoryDeadLetterStore {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                time_provider,
                unavailable: AtomicBool::new(false),
            }
        }

        /// Simulate an unreachable store
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Every entry ever appended (including expired)
        pub fn all(&self) -> Vec<DeadLetterEntry> {
            self.entries.lock().unwrap().clone()
        }

        fn check_available(&self) -> Result<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::Database("dead-letter store unavailable".to_string()));
            }
            Ok(())
        }

        fn visible(&self, queue_name: Option<&str>) -> Vec<DeadLetterEntry> {
            let now = self.time_provider.now_millis();
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| !e.is_expired(now))
                .filter(|e| queue_name.map_or(true, |q| e.queue_name == q))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl DeadLetterStore for InMemoryDeadLetterStore {
        async fn append(&self, entry: &DeadLetterEntry) -> Result<()> {
            self.check_available()?;
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<DeadLetterEntry>> {
            self.check_available()?;
            Ok(self.visible(None).into_iter().find(|e| e.id == id))
        }

        async fn list(&self, queue_name: Option<&str>, limit: usize) -> Result<Vec<DeadLetterEntry>> {
            self.check_available()?;
            let mut entries = self.visible(queue_name);
            entries.sort_by_key(|e| e.failed_at);
            entries.truncate(limit);
            Ok(entries)
        }

        async fn remove(&self, id: &str) -> Result<bool> {
            self.check_available()?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|e| e.id != id);
            Ok(entries.len() < before)
        }

        async fn count(&self, queue_name: Option<&str>) -> Result<u64> {
            self.check_available()?;
            Ok(self.visible(queue_name).len() as u64)
        }
    }
}
