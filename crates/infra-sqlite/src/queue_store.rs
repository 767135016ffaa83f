// SQLite QueueStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::{QueueDescriptor, QueueItem, RawItem};
use hookline_core::error::Result;
use hookline_core::port::{EnqueueOutcome, QueueStore, TimeProvider};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::debug;

/// FIFO lists in `queue_items`, expiry in `queue_meta`.
///
/// Every write path opens its transaction with a write statement, so SQLite
/// takes the write lock before anything is read and concurrent writers
/// queue up on `busy_timeout` instead of racing.
pub struct SqliteQueueStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Delete the items of `queue_name` if its expiry has passed
    async fn purge_if_expired(
        tx: &mut Transaction<'_, Sqlite>,
        queue_name: &str,
        now: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM queue_items
            WHERE queue_name = ?
              AND EXISTS (
                  SELECT 1 FROM queue_meta
                  WHERE queue_name = ? AND expires_at <= ?
              )
            "#,
        )
        .bind(queue_name)
        .bind(queue_name)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(queue = %queue_name, purged, "Expired queue purged on write");
        }
        Ok(purged)
    }

    async fn count(tx: &mut Transaction<'_, Sqlite>, queue_name: &str) -> Result<u64> {
        let depth: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_items WHERE queue_name = ?")
            .bind(queue_name)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(depth as u64)
    }

    /// Append and refresh the queue's expiry
    async fn append(
        tx: &mut Transaction<'_, Sqlite>,
        queue: &QueueDescriptor,
        body: &str,
        now: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO queue_items (queue_name, body, enqueued_at) VALUES (?, ?, ?)")
            .bind(&queue.name)
            .bind(body)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO queue_meta (queue_name, expires_at) VALUES (?, ?)
            ON CONFLICT(queue_name) DO UPDATE SET expires_at = excluded.expires_at
            "#,
        )
        .bind(&queue.name)
        .bind(now + queue.ttl_millis())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn enqueue_inner(
        &self,
        queue: &QueueDescriptor,
        item: &QueueItem,
        bounded: bool,
    ) -> Result<EnqueueOutcome> {
        // Serialization failures never reach the store
        let body = item.encode()?;
        let now = self.time_provider.now_millis();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Self::purge_if_expired(&mut tx, &queue.name, now).await?;

        let depth = Self::count(&mut tx, &queue.name).await?;
        if bounded && depth >= queue.max_depth {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(EnqueueOutcome::Full { depth });
        }

        Self::append(&mut tx, queue, &body, now).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(EnqueueOutcome::Enqueued { depth: depth + 1 })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, queue: &QueueDescriptor, item: &QueueItem) -> Result<u64> {
        match self.enqueue_inner(queue, item, false).await? {
            EnqueueOutcome::Enqueued { depth } | EnqueueOutcome::Full { depth } => Ok(depth),
        }
    }

    async fn enqueue_bounded(
        &self,
        queue: &QueueDescriptor,
        item: &QueueItem,
    ) -> Result<EnqueueOutcome> {
        self.enqueue_inner(queue, item, true).await
    }

    async fn depth(&self, queue_name: &str) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let depth: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM queue_items
            WHERE queue_name = ?
              AND EXISTS (
                  SELECT 1 FROM queue_meta
                  WHERE queue_name = ? AND expires_at > ?
              )
            "#,
        )
        .bind(queue_name)
        .bind(queue_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(depth as u64)
    }

    async fn peek(&self, queue_name: &str) -> Result<Option<QueueItem>> {
        let now = self.time_provider.now_millis();
        let body: Option<String> = sqlx::query_scalar(
            r#"
            SELECT body FROM queue_items
            WHERE queue_name = ?
              AND EXISTS (
                  SELECT 1 FROM queue_meta
                  WHERE queue_name = ? AND expires_at > ?
              )
            ORDER BY seq ASC
            LIMIT 1
            "#,
        )
        .bind(queue_name)
        .bind(queue_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match body {
            Some(body) => Ok(Some(QueueItem::decode(&body)?)),
            None => Ok(None),
        }
    }

    async fn flush(&self, queue_name: &str) -> Result<u64> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Items of an expired queue were already invisible
        let expired = Self::purge_if_expired(&mut tx, queue_name, now).await?;
        let removed = sqlx::query("DELETE FROM queue_items WHERE queue_name = ?")
            .bind(queue_name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        sqlx::query("DELETE FROM queue_meta WHERE queue_name = ?")
            .bind(queue_name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(queue = %queue_name, removed, expired, "Queue flushed");
        Ok(removed)
    }

    async fn take_head(&self, queue_name: &str, n: usize) -> Result<Vec<RawItem>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        Self::purge_if_expired(&mut tx, queue_name, now).await?;

        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            DELETE FROM queue_items
            WHERE seq IN (
                SELECT seq FROM queue_items
                WHERE queue_name = ?
                ORDER BY seq ASC
                LIMIT ?
            )
            RETURNING seq, body
            "#,
        )
        .bind(queue_name)
        .bind(n as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        // RETURNING order is unspecified
        let mut items: Vec<RawItem> = rows
            .into_iter()
            .map(|(seq, body)| RawItem::new(seq, body))
            .collect();
        items.sort_by_key(|item| item.seq);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;
    use hookline_core::port::time_provider::mocks::ManualTimeProvider;
    use serde_json::json;
    use std::time::Duration;

    fn descriptor(max_depth: u64) -> QueueDescriptor {
        QueueDescriptor::new(
            "Q",
            max_depth,
            2,
            Duration::from_secs(60),
            Duration::from_secs(5),
        )
    }

    async fn setup() -> (SqliteQueueStore, Arc<ManualTimeProvider>) {
        let pool = setup_test_db().await;
        let clock = Arc::new(ManualTimeProvider::new(1_000_000));
        (SqliteQueueStore::new(pool, clock.clone()), clock)
    }

    fn item(payload: &str) -> QueueItem {
        QueueItem::new_test("test", json!(payload))
    }

    #[tokio::test]
    async fn test_enqueue_then_take_head_in_order() {
        let (store, _) = setup().await;
        let q = descriptor(100);
        for p in ["A", "B", "C"] {
            store.enqueue(&q, &item(p)).await.unwrap();
        }
        assert_eq!(store.depth("Q").await.unwrap(), 3);

        let taken = store.take_head("Q", 2).await.unwrap();
        let payloads: Vec<_> = taken
            .iter()
            .map(|raw| raw.decode().unwrap().payload)
            .collect();
        assert_eq!(payloads, vec![json!("A"), json!("B")]);
        assert_eq!(store.depth("Q").await.unwrap(), 1);

        let head = store.peek("Q").await.unwrap().unwrap();
        assert_eq!(head.payload, json!("C"));
    }

    #[tokio::test]
    async fn test_bounded_enqueue_rejects_at_max_depth() {
        let (store, _) = setup().await;
        let q = descriptor(3);

        for (i, p) in ["A", "B", "C"].iter().enumerate() {
            let outcome = store.enqueue_bounded(&q, &item(p)).await.unwrap();
            assert_eq!(outcome, EnqueueOutcome::Enqueued { depth: i as u64 + 1 });
        }

        let outcome = store.enqueue_bounded(&q, &item("D")).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Full { depth: 3 });
        assert_eq!(store.depth("Q").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let (store, _) = setup().await;
        let q = descriptor(10);
        let other = QueueDescriptor::new(
            "other",
            10,
            2,
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        store.enqueue(&q, &item("A")).await.unwrap();
        store.enqueue(&other, &item("X")).await.unwrap();

        assert_eq!(store.depth("Q").await.unwrap(), 1);
        assert_eq!(store.depth("other").await.unwrap(), 1);
        assert_eq!(store.depth("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_queue_observed_empty_and_purged_on_write() {
        let (store, clock) = setup().await;
        let q = descriptor(2);
        store.enqueue(&q, &item("A")).await.unwrap();
        store.enqueue(&q, &item("B")).await.unwrap();

        clock.advance(60_000);
        assert_eq!(store.depth("Q").await.unwrap(), 0);
        assert!(store.peek("Q").await.unwrap().is_none());

        // Room again: the expired items no longer count
        let outcome = store.enqueue_bounded(&q, &item("C")).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Enqueued { depth: 1 });
        assert_eq!(store.peek("Q").await.unwrap().unwrap().payload, json!("C"));
    }

    #[tokio::test]
    async fn test_append_refreshes_ttl() {
        let (store, clock) = setup().await;
        let q = descriptor(10);
        store.enqueue(&q, &item("A")).await.unwrap();

        clock.advance(50_000);
        store.enqueue(&q, &item("B")).await.unwrap();
        clock.advance(50_000);

        assert_eq!(store.depth("Q").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_take_head_of_expired_queue_is_empty() {
        let (store, clock) = setup().await;
        store.enqueue(&descriptor(10), &item("A")).await.unwrap();

        clock.advance(60_001);
        assert!(store.take_head("Q", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_returns_removed_count() {
        let (store, _) = setup().await;
        let q = descriptor(10);
        store.enqueue(&q, &item("A")).await.unwrap();
        store.enqueue(&q, &item("B")).await.unwrap();

        assert_eq!(store.flush("Q").await.unwrap(), 2);
        assert_eq!(store.depth("Q").await.unwrap(), 0);
        assert_eq!(store.flush("Q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unbounded_enqueue_ignores_max_depth() {
        let (store, _) = setup().await;
        let q = descriptor(1);
        store.enqueue(&q, &item("A")).await.unwrap();
        let depth = store.enqueue(&q, &item("B")).await.unwrap();
        assert_eq!(depth, 2);
    }
}
