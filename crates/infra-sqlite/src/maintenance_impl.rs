// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::error::{AppError, Result};
use hookline_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Get DB file size in bytes
    async fn get_db_size_bytes(&self) -> Result<i64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get page count: {}", e)))?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get page size: {}", e)))?;

        Ok(page_count * page_size)
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("Running VACUUM to optimize database...");

        let size_before = bytes_to_mb(self.get_db_size_bytes().await?);

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("VACUUM failed: {}", e)))?;

        let size_after = bytes_to_mb(self.get_db_size_bytes().await?);
        let reclaimed = (size_before - size_after).max(0.0);

        info!(
            size_before_mb = size_before,
            size_after_mb = size_after,
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn purge_expired_items(&self) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let items = sqlx::query(
            r#"
            DELETE FROM queue_items
            WHERE queue_name IN (
                SELECT queue_name FROM queue_meta WHERE expires_at <= ?
            )
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        let queues = sqlx::query("DELETE FROM queue_meta WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;

        if items > 0 {
            info!(expired_items = items, expired_queues = queues, "Expired queue items purged");
        }
        Ok(items)
    }

    async fn purge_expired_dead_letters(&self) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM dead_letters WHERE expires_at <= ?")
            .bind(self.time_provider.now_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if deleted > 0 {
            info!(expired_dead_letters = deleted, "Expired dead-letter entries purged");
        }
        Ok(deleted)
    }

    async fn purge_expired_leases(&self) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM leases WHERE expires_at <= ?")
            .bind(self.time_provider.now_millis())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.get_db_size_bytes().await?;

        Ok(MaintenanceStats {
            db_size_mb: bytes_to_mb(db_size_bytes),
            db_size_bytes,
            stored_items: self.count("SELECT COUNT(*) FROM queue_items").await?,
            dead_letters: self.count("SELECT COUNT(*) FROM dead_letters").await?,
            active_leases: self.count("SELECT COUNT(*) FROM leases").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;
    use crate::{SqliteDeadLetterStore, SqliteLeaseStore, SqliteQueueStore};
    use hookline_core::domain::{DeadLetterEntry, QueueDescriptor, QueueItem};
    use hookline_core::port::time_provider::mocks::ManualTimeProvider;
    use hookline_core::port::{DeadLetterStore, LeaseStore, MaintenanceConfig, QueueStore};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        maintenance: SqliteMaintenance,
        queues: SqliteQueueStore,
        leases: SqliteLeaseStore,
        dead_letters: SqliteDeadLetterStore,
        clock: Arc<ManualTimeProvider>,
    }

    async fn fixture() -> Fixture {
        let pool = setup_test_db().await;
        let clock = Arc::new(ManualTimeProvider::new(0));
        Fixture {
            maintenance: SqliteMaintenance::new(pool.clone(), clock.clone()),
            queues: SqliteQueueStore::new(pool.clone(), clock.clone()),
            leases: SqliteLeaseStore::new(pool.clone(), clock.clone()),
            dead_letters: SqliteDeadLetterStore::new(pool, clock.clone()),
            clock,
        }
    }

    fn queue(name: &str, ttl_secs: u64) -> QueueDescriptor {
        QueueDescriptor::new(
            name,
            100,
            10,
            Duration::from_secs(ttl_secs),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_maintenance_stats() {
        let f = fixture().await;
        f.queues
            .enqueue(&queue("Q", 60), &QueueItem::new_test("t", json!(1)))
            .await
            .unwrap();

        let stats = f.maintenance.get_stats().await.unwrap();
        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.stored_items, 1);
        assert_eq!(stats.dead_letters, 0);
        assert_eq!(stats.active_leases, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let f = fixture().await;
        let reclaimed = f.maintenance.vacuum().await.unwrap();
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_full_sweep_removes_only_expired() {
        let f = fixture().await;
        let short = queue("short", 10);
        let long = queue("long", 3600);
        f.queues
            .enqueue(&short, &QueueItem::new_test("t", json!("a")))
            .await
            .unwrap();
        f.queues
            .enqueue(&long, &QueueItem::new_test("t", json!("b")))
            .await
            .unwrap();
        f.leases
            .try_acquire("short", "crashed-worker", Duration::from_secs(5))
            .await
            .unwrap();
        f.dead_letters
            .append(&DeadLetterEntry::new(
                "dl-1",
                "short",
                QueueItem::new_test("t", json!("c")),
                "boom",
                Vec::new(),
                0,
                20_000,
            ))
            .await
            .unwrap();

        f.clock.set(30_000);
        let report = f
            .maintenance
            .run_full_maintenance(&MaintenanceConfig::default())
            .await
            .unwrap();

        assert_eq!(report.expired_items, 1);
        assert_eq!(report.expired_dead_letters, 1);
        assert_eq!(report.expired_leases, 1);
        assert!(!report.vacuumed);

        let stats = f.maintenance.get_stats().await.unwrap();
        assert_eq!(stats.stored_items, 1);
        assert_eq!(f.queues.depth("long").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vacuum_runs_over_ceiling() {
        let f = fixture().await;
        let config = MaintenanceConfig { max_db_size_mb: 0.0 };

        let report = f.maintenance.run_full_maintenance(&config).await.unwrap();
        assert!(report.vacuumed);
        assert!(report.reclaimed_mb >= 0.0);
    }
}
