//! In-memory outbox store for tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;
use tokio::sync::RwLock;

use crate::{OutboxEntry, OutboxError, OutboxStatus, OutboxStore};

#[derive(Default)]
struct Inner {
    entries: Vec<OutboxEntry>,
    next_position: i64,
}

/// In-memory [`OutboxStore`] with the same ordering semantics as the
/// Postgres store.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every entry, in position order.
    pub async fn entries(&self) -> Vec<OutboxEntry> {
        self.inner.read().await.entries.clone()
    }

    /// Returns the entry with the given event id, if any.
    pub async fn entry(&self, event_id: EventId) -> Option<OutboxEntry> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        let mut inner = self.inner.write().await;
        inner.next_position += 1;
        let mut entry = entry.clone();
        entry.position = inner.next_position;
        inner.entries.push(entry);
        Ok(())
    }

    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxEntry>, OutboxError> {
        let inner = self.inner.read().await;
        let parked: std::collections::HashSet<_> = inner
            .entries
            .iter()
            .filter(|e| e.status == OutboxStatus::DeadLettered)
            .map(|e| e.aggregate_id)
            .collect();
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.status.is_unpublished() && !parked.contains(&e.aggregate_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, event_id: EventId) -> Result<(), OutboxError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.event_id == event_id) {
            entry.status = OutboxStatus::Published;
            entry.published_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: EventId,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), OutboxError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.event_id == event_id) {
            entry.status = OutboxStatus::FailedRetryable;
            entry.attempts = attempts;
            entry.next_attempt_at = next_attempt_at;
        }
        Ok(())
    }

    async fn mark_dead_lettered(&self, event_id: EventId) -> Result<(), OutboxError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.event_id == event_id) {
            entry.status = OutboxStatus::DeadLettered;
        }
        Ok(())
    }

    async fn purge_published(&self, older_than: DateTime<Utc>) -> Result<u64, OutboxError> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| {
            !(e.status == OutboxStatus::Published
                && e.published_at.is_some_and(|at| at < older_than))
        });
        Ok((before - inner.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId, OrderItem, OrderStatus, ProductId, UserId};
    use events::{EventEnvelope, OrderEvent};

    async fn staged_entry(store: &InMemoryOutboxStore) -> OutboxEntry {
        staged_entry_for(store, OrderId::new()).await
    }

    async fn staged_entry_for(store: &InMemoryOutboxStore, order_id: OrderId) -> OutboxEntry {
        let event = OrderEvent::created(
            order_id,
            UserId::new(),
            vec![OrderItem {
                product_id: ProductId::from("sku-1"),
                quantity: 2,
                price: Money::from_cents(500),
            }],
            Money::from_cents(1000),
            OrderStatus::Pending,
        );
        let envelope = EventEnvelope::for_event(&event).unwrap();
        let entry = OutboxEntry::for_envelope(&envelope, event.routing_key()).unwrap();
        store.insert(&entry).await.unwrap();
        store.entry(entry.event_id).await.unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_increasing_positions() {
        let store = InMemoryOutboxStore::new();
        let first = staged_entry(&store).await;
        let second = staged_entry(&store).await;
        assert!(second.position > first.position);
    }

    #[tokio::test]
    async fn fetch_skips_published_and_dead_lettered() {
        let store = InMemoryOutboxStore::new();
        let published = staged_entry(&store).await;
        let dead = staged_entry(&store).await;
        let live = staged_entry(&store).await;

        store.mark_published(published.event_id).await.unwrap();
        store.mark_dead_lettered(dead.event_id).await.unwrap();

        let unpublished = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(unpublished.len(), 1);
        assert_eq!(unpublished[0].event_id, live.event_id);
    }

    #[tokio::test]
    async fn a_dead_lettered_entry_parks_its_aggregate() {
        let store = InMemoryOutboxStore::new();
        let order_id = OrderId::new();
        let dead = staged_entry_for(&store, order_id).await;
        let blocked = staged_entry_for(&store, order_id).await;
        let other = staged_entry(&store).await;

        store.mark_dead_lettered(dead.event_id).await.unwrap();

        let unpublished = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(unpublished.len(), 1);
        assert_eq!(unpublished[0].event_id, other.event_id);

        // The parked sibling is withheld, not forgotten.
        let parked = store.entry(blocked.event_id).await.unwrap();
        assert_eq!(parked.status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn mark_failed_records_attempts_and_schedule() {
        let store = InMemoryOutboxStore::new();
        let entry = staged_entry(&store).await;
        let later = Utc::now() + chrono::Duration::seconds(30);

        store.mark_failed(entry.event_id, 3, later).await.unwrap();

        let updated = store.entry(entry.event_id).await.unwrap();
        assert_eq!(updated.status, OutboxStatus::FailedRetryable);
        assert_eq!(updated.attempts, 3);
        assert_eq!(updated.next_attempt_at, later);
    }

    #[tokio::test]
    async fn purge_removes_only_old_published_entries() {
        let store = InMemoryOutboxStore::new();
        let old = staged_entry(&store).await;
        let pending = staged_entry(&store).await;
        store.mark_published(old.event_id).await.unwrap();

        let purged = store
            .purge_published(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        let remaining = store.entries().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].event_id, pending.event_id);
    }
}
