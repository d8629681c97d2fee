//! PostgreSQL-backed outbox store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{OutboxEntry, OutboxError, OutboxStatus, OutboxStore};

/// Outbox store backed by the `outbox` table.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Inserts an entry through an arbitrary executor.
///
/// Repositories call this with their own transaction so the entry commits
/// or rolls back together with the state change that produced it.
pub async fn insert_entry<'e, E>(executor: E, entry: &OutboxEntry) -> Result<(), OutboxError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO outbox
            (event_id, aggregate_id, event_type, routing_key, payload,
             status, attempts, next_attempt_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.event_id.as_uuid())
    .bind(entry.aggregate_id.as_uuid())
    .bind(&entry.event_type)
    .bind(&entry.routing_key)
    .bind(&entry.payload)
    .bind(entry.status.as_str())
    .bind(entry.attempts)
    .bind(entry.next_attempt_at)
    .bind(entry.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

fn entry_from_row(row: &PgRow) -> Result<OutboxEntry, OutboxError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OutboxStatus>()
        .map_err(OutboxError::Corrupt)?;

    Ok(OutboxEntry {
        position: row.try_get("position")?,
        event_id: EventId::from_uuid(row.try_get("event_id")?),
        aggregate_id: OrderId::from_uuid(row.try_get("aggregate_id")?),
        event_type: row.try_get("event_type")?,
        routing_key: row.try_get("routing_key")?,
        payload: row.try_get("payload")?,
        status,
        attempts: row.try_get("attempts")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        created_at: row.try_get("created_at")?,
        published_at: row.try_get("published_at")?,
    })
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn insert(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        insert_entry(&self.pool, entry).await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxEntry>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT position, event_id, aggregate_id, event_type, routing_key,
                   payload, status, attempts, next_attempt_at, created_at,
                   published_at
            FROM outbox
            WHERE status IN ('pending', 'failed_retryable')
              AND NOT EXISTS (
                  SELECT 1 FROM outbox dead
                  WHERE dead.aggregate_id = outbox.aggregate_id
                    AND dead.status = 'dead_lettered'
              )
            ORDER BY position
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn mark_published(&self, event_id: EventId) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'published', published_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: EventId,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'failed_retryable', attempts = $2, next_attempt_at = $3
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(attempts)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_dead_lettered(&self, event_id: EventId) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'dead_lettered'
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn purge_published(&self, older_than: DateTime<Utc>) -> Result<u64, OutboxError> {
        let result = sqlx::query(
            r#"
            DELETE FROM outbox
            WHERE status = 'published' AND published_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
