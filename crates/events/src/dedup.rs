//! Idempotent consumer contract.
//!
//! The relay delivers at-least-once: a crash between broker acknowledgment
//! and marking an outbox entry published causes redelivery. Every consumer
//! must therefore record processed event ids and apply an event's effect at
//! most once — and must do both in the same local transaction. This module
//! defines that contract and an in-memory implementation for tests; each
//! consuming service supplies its own durable implementation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::EventId;
use tokio::sync::Mutex;

/// Record of event ids a consumer has already processed.
#[async_trait]
pub trait ProcessedEventLog: Send + Sync {
    /// Marks an event id as processed.
    ///
    /// Returns true if this is the first time the id was seen, false on a
    /// redelivery. Durable implementations must write the record in the
    /// same transaction as the event's effect.
    async fn mark_processed(&self, event_id: EventId) -> bool;
}

/// In-memory processed-event log for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryProcessedLog {
    seen: Arc<Mutex<HashSet<EventId>>>,
}

impl InMemoryProcessedLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many distinct event ids have been processed.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Returns true if no event has been processed yet.
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEventLog for InMemoryProcessedLog {
    async fn mark_processed(&self, event_id: EventId) -> bool {
        self.seen.lock().await.insert(event_id)
    }
}

/// Runs `effect` only if `event_id` has not been processed before.
///
/// Returns `Some` with the effect's output on first delivery, `None` on a
/// duplicate.
pub async fn process_once<L, F, Fut, T>(log: &L, event_id: EventId, effect: F) -> Option<T>
where
    L: ProcessedEventLog + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if log.mark_processed(event_id).await {
        Some(effect().await)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn first_delivery_applies_effect() {
        let log = InMemoryProcessedLog::new();
        let applied = AtomicU32::new(0);

        let result = process_once(&log, EventId::new(), || async {
            applied.fetch_add(1, Ordering::SeqCst);
            "done"
        })
        .await;

        assert_eq!(result, Some("done"));
        assert_eq!(applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn redelivery_applies_effect_exactly_once() {
        let log = InMemoryProcessedLog::new();
        let event_id = EventId::new();
        let applied = AtomicU32::new(0);

        for _ in 0..3 {
            process_once(&log, event_id, || async {
                applied.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        }

        assert_eq!(applied.load(Ordering::SeqCst), 1);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_events_each_apply() {
        let log = InMemoryProcessedLog::new();
        let applied = AtomicU32::new(0);

        for _ in 0..3 {
            process_once(&log, EventId::new(), || async {
                applied.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        }

        assert_eq!(applied.load(Ordering::SeqCst), 3);
    }
}
