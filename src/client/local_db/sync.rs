//! # Offline Queue Storage
//!
//! SQLite-backed [`QueueStore`]. Rows are ordered by an autoincrement
//! sequence so replay follows enqueue order even when two sends share a
//! timestamp. `temp_id` is unique; re-enqueueing an id keeps its original
//! position.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{LocalDatabase, Result};
use crate::client::error::ClientError;
use crate::client::offline::queue::{PendingSend, QueueStore};

impl LocalDatabase {
    /// Number of queued sends
    pub async fn count_queued(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_pending(row: &sqlx::sqlite::SqliteRow) -> Result<PendingSend> {
    let temp_id: String = row.try_get("temp_id")?;
    let conversation_id: String = row.try_get("conversation_id")?;
    let enqueued_at: String = row.try_get("enqueued_at")?;

    Ok(PendingSend {
        temp_id: Uuid::parse_str(&temp_id)
            .map_err(|e| ClientError::Storage(format!("bad temp_id '{}': {}", temp_id, e)))?,
        conversation_id: Uuid::parse_str(&conversation_id).map_err(|e| {
            ClientError::Storage(format!("bad conversation_id '{}': {}", conversation_id, e))
        })?,
        content: row.try_get("content")?,
        enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| ClientError::Storage(format!("bad enqueued_at '{}': {}", enqueued_at, e)))?,
    })
}

#[async_trait]
impl QueueStore for LocalDatabase {
    async fn load(&self) -> Result<Vec<PendingSend>> {
        let rows = sqlx::query(
            "SELECT seq, temp_id, conversation_id, content, enqueued_at
             FROM offline_queue
             ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut unreadable = Vec::new();
        for row in &rows {
            match row_to_pending(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("[DB] Dropping unreadable queue row: {}", e);
                    unreadable.push(row.try_get::<i64, _>("seq")?);
                }
            }
        }

        // Never replayable, so they would only pile up
        for seq in unreadable {
            sqlx::query("DELETE FROM offline_queue WHERE seq = ?")
                .bind(seq)
                .execute(&self.pool)
                .await?;
        }
        Ok(entries)
    }

    async fn insert(&self, entry: &PendingSend) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO offline_queue (temp_id, conversation_id, content, enqueued_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(entry.temp_id.to_string())
        .bind(entry.conversation_id.to_string())
        .bind(&entry.content)
        .bind(entry.enqueued_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, temp_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM offline_queue WHERE temp_id = ?")
            .bind(temp_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
