use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;

use crate::{OutboxEntry, OutboxError};

/// Persistence for staged events.
///
/// Implementations must assign a monotonically increasing `position` on
/// insert and return unpublished entries in position order, so the relay
/// can preserve per-aggregate publish order.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts a new entry, assigning its position.
    async fn insert(&self, entry: &OutboxEntry) -> Result<(), OutboxError>;

    /// Returns up to `limit` entries still awaiting delivery, oldest first.
    ///
    /// Includes retryable entries whose backoff has not yet elapsed; the
    /// relay decides what is due. Never returns published or dead-lettered
    /// entries. An aggregate with a dead-lettered entry is excluded
    /// entirely: its later events must not overtake the parked one, so the
    /// whole aggregate waits for operator intervention.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Marks an entry as acknowledged by the broker.
    async fn mark_published(&self, event_id: EventId) -> Result<(), OutboxError>;

    /// Records a failed attempt and schedules the next one.
    async fn mark_failed(
        &self,
        event_id: EventId,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), OutboxError>;

    /// Parks an entry that exhausted its attempts.
    async fn mark_dead_lettered(&self, event_id: EventId) -> Result<(), OutboxError>;

    /// Deletes published entries older than the given cutoff.
    ///
    /// Only published entries are ever purged; dead-lettered entries stay
    /// until an operator resolves them.
    async fn purge_published(&self, older_than: DateTime<Utc>) -> Result<u64, OutboxError>;
}
