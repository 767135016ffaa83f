// SQLite LeaseStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::ProcessingLease;
use hookline_core::error::Result;
use hookline_core::port::{LeaseStore, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// One row per queue in `leases`
pub struct SqliteLeaseStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteLeaseStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    async fn try_acquire(
        &self,
        queue_name: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<Option<ProcessingLease>> {
        let now = self.time_provider.now_millis();
        let expires_at = now + ttl.as_millis() as i64;

        // Set-if-absent: an existing row is only taken over once expired
        let result = sqlx::query(
            r#"
            INSERT INTO leases (queue_name, holder_id, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(queue_name) DO UPDATE
                SET holder_id = excluded.holder_id, expires_at = excluded.expires_at
                WHERE leases.expires_at <= ?
            "#,
        )
        .bind(queue_name)
        .bind(holder_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(ProcessingLease::new(queue_name, holder_id, expires_at)))
    }

    async fn release(&self, lease: &ProcessingLease) -> Result<bool> {
        // Matching on expires_at too: a newer lease by the same holder survives
        let result = sqlx::query(
            "DELETE FROM leases WHERE queue_name = ? AND holder_id = ? AND expires_at = ?",
        )
        .bind(&lease.queue_name)
        .bind(&lease.holder_id)
        .bind(lease.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;
    use hookline_core::port::time_provider::mocks::ManualTimeProvider;

    async fn setup() -> (SqliteLeaseStore, Arc<ManualTimeProvider>) {
        let pool = setup_test_db().await;
        let clock = Arc::new(ManualTimeProvider::new(10_000));
        (SqliteLeaseStore::new(pool, clock.clone()), clock)
    }

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_single_holder_at_a_time() {
        let (store, _) = setup().await;

        let lease = store.try_acquire("Q", "w1", TTL).await.unwrap().unwrap();
        assert_eq!(lease.expires_at, 15_000);
        assert!(store.try_acquire("Q", "w2", TTL).await.unwrap().is_none());

        // Other queues are unaffected
        assert!(store.try_acquire("R", "w2", TTL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_frees_the_queue() {
        let (store, _) = setup().await;
        let lease = store.try_acquire("Q", "w1", TTL).await.unwrap().unwrap();

        assert!(store.release(&lease).await.unwrap());
        assert!(store.try_acquire("Q", "w2", TTL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let (store, clock) = setup().await;
        let stale = store.try_acquire("Q", "w1", TTL).await.unwrap().unwrap();

        clock.advance(5_000);
        let fresh = store.try_acquire("Q", "w2", TTL).await.unwrap().unwrap();
        assert_eq!(fresh.holder_id, "w2");

        // The crashed holder's late release must not free w2's lease
        assert!(!store.release(&stale).await.unwrap());
        assert!(store.try_acquire("Q", "w3", TTL).await.unwrap().is_none());
    }
}
