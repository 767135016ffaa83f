// SQLite DeadLetterStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::{DeadLetterEntry, QueueItem};
use hookline_core::error::Result;
use hookline_core::port::{DeadLetterStore, TimeProvider};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::warn;

#[derive(FromRow)]
struct DeadLetterRow {
    id: String,
    queue_name: String,
    body: String,
    error_message: String,
    error_context: String,
    failed_at: i64,
    expires_at: i64,
}

impl DeadLetterRow {
    fn into_entry(self) -> Result<DeadLetterEntry> {
        Ok(DeadLetterEntry {
            id: self.id,
            queue_name: self.queue_name,
            original_item: QueueItem::decode(&self.body)?,
            error_message: self.error_message,
            error_context: serde_json::from_str(&self.error_context)?,
            failed_at: self.failed_at,
            expires_at: self.expires_at,
        })
    }
}

/// Rows of `dead_letters`; expired rows are filtered on read
pub struct SqliteDeadLetterStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteDeadLetterStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl DeadLetterStore for SqliteDeadLetterStore {
    async fn append(&self, entry: &DeadLetterEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters (
                id, queue_name, item_id, body,
                error_message, error_context, failed_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.queue_name)
        .bind(&entry.original_item.id)
        .bind(entry.original_item.encode()?)
        .bind(&entry.error_message)
        .bind(serde_json::to_string(&entry.error_context)?)
        .bind(entry.failed_at)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DeadLetterEntry>> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            "SELECT * FROM dead_letters WHERE id = ? AND expires_at > ?",
        )
        .bind(id)
        .bind(self.time_provider.now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(DeadLetterRow::into_entry).transpose()
    }

    async fn list(&self, queue_name: Option<&str>, limit: usize) -> Result<Vec<DeadLetterEntry>> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT * FROM dead_letters
            WHERE expires_at > ?
              AND (? IS NULL OR queue_name = ?)
            ORDER BY failed_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(self.time_provider.now_millis())
        .bind(queue_name)
        .bind(queue_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(dead_letter_id = %id, error = %e, "Skipping unreadable dead-letter entry"),
            }
        }
        Ok(entries)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dead_letters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, queue_name: Option<&str>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM dead_letters
            WHERE expires_at > ?
              AND (? IS NULL OR queue_name = ?)
            "#,
        )
        .bind(self.time_provider.now_millis())
        .bind(queue_name)
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count as u64)
    }
}
