//! Background relay that drains the outbox to the broker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broker::{BrokerError, EventBroker, Publication};
use chrono::Utc;
use common::OrderId;
use events::topology::exchange_for;
use tokio::sync::watch;

use crate::{OutboxEntry, OutboxError, OutboxStore};

/// Tuning knobs for the relay loop.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Pause between drain cycles.
    pub poll_interval: Duration,
    /// Maximum entries fetched per cycle.
    pub batch_size: i64,
    /// Attempts before an entry is dead-lettered.
    pub max_attempts: i32,
    /// Backoff after the first failure; doubles per attempt.
    pub base_backoff: Duration,
    /// Ceiling on the computed backoff.
    pub max_backoff: Duration,
    /// Pause between purge sweeps of published entries.
    pub purge_interval: Duration,
    /// How long published entries are retained before purging.
    pub retention: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            max_attempts: 8,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            purge_interval: Duration::from_secs(300),
            retention: Duration::from_secs(3600),
        }
    }
}

/// Outcome of a single drain cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub published: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Polls the outbox and publishes due entries to the broker.
///
/// Entries are drained in position order, grouped per aggregate. A failed
/// entry blocks the rest of its aggregate's batch for the cycle, so
/// per-aggregate publish order is never violated by a retry.
pub struct OutboxRelay<S: OutboxStore> {
    store: S,
    broker: Arc<dyn EventBroker>,
    config: RelayConfig,
}

impl<S: OutboxStore> OutboxRelay<S> {
    pub fn new(store: S, broker: Arc<dyn EventBroker>, config: RelayConfig) -> Self {
        Self { store, broker, config }
    }

    /// Runs the relay until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut purge = tokio::time::interval(self.config.purge_interval);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "outbox drain cycle failed");
                    }
                }
                _ = purge.tick() => {
                    let cutoff = Utc::now()
                        - chrono::Duration::from_std(self.config.retention)
                            .unwrap_or_else(|_| chrono::Duration::hours(1));
                    match self.store.purge_published(cutoff).await {
                        Ok(0) => {}
                        Ok(purged) => tracing::debug!(purged, "purged published entries"),
                        Err(e) => tracing::warn!(error = %e, "outbox purge failed"),
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("outbox relay shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Drains one batch. Public so tests and one-shot tools can step the
    /// relay without the timer loop.
    #[tracing::instrument(skip(self))]
    pub async fn drain_once(&self) -> Result<DrainReport, OutboxError> {
        let entries = self.store.fetch_unpublished(self.config.batch_size).await?;
        let mut report = DrainReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let now = Utc::now();
        for batch in group_by_aggregate(entries) {
            // Skipping the whole aggregate when its head is not yet due
            // keeps later entries from overtaking an entry in backoff.
            if !batch[0].is_due(now) {
                continue;
            }

            for entry in &batch {
                match self.broker.publish(publication_for(entry)).await {
                    Ok(()) => {
                        self.store.mark_published(entry.event_id).await?;
                        metrics::counter!("outbox_published_total").increment(1);
                        report.published += 1;
                    }
                    Err(e) => {
                        self.record_failure(entry, &e, &mut report).await?;
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn record_failure(
        &self,
        entry: &OutboxEntry,
        error: &BrokerError,
        report: &mut DrainReport,
    ) -> Result<(), OutboxError> {
        let attempts = entry.attempts + 1;
        if attempts >= self.config.max_attempts {
            tracing::error!(
                event_id = %entry.event_id,
                aggregate_id = %entry.aggregate_id,
                event_type = %entry.event_type,
                attempts,
                error = %error,
                "entry exhausted its attempts, dead-lettering"
            );
            self.store.mark_dead_lettered(entry.event_id).await?;
            metrics::counter!("outbox_dead_lettered_total").increment(1);
            report.dead_lettered += 1;
        } else {
            let delay = backoff_delay(self.config.base_backoff, self.config.max_backoff, attempts);
            let next_attempt_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1));
            tracing::warn!(
                event_id = %entry.event_id,
                attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "publish failed, scheduling retry"
            );
            self.store
                .mark_failed(entry.event_id, attempts, next_attempt_at)
                .await?;
            metrics::counter!("outbox_publish_failures_total").increment(1);
            report.failed += 1;
        }
        Ok(())
    }
}

fn publication_for(entry: &OutboxEntry) -> Publication {
    Publication {
        exchange: exchange_for(&entry.routing_key).to_string(),
        routing_key: entry.routing_key.clone(),
        partition_key: entry.aggregate_id.to_string(),
        payload: entry.payload.to_string().into_bytes(),
    }
}

/// Groups a position-ordered batch per aggregate, preserving order within
/// each group and the first-seen order of the groups themselves.
fn group_by_aggregate(entries: Vec<OutboxEntry>) -> Vec<Vec<OutboxEntry>> {
    let mut order: Vec<OrderId> = Vec::new();
    let mut groups: HashMap<OrderId, Vec<OutboxEntry>> = HashMap::new();
    for entry in entries {
        let key = entry.aggregate_id;
        if !groups.contains_key(&key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(entry);
    }
    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

fn backoff_delay(base: Duration, max: Duration, attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(30) as u32;
    let factor = 2u32.saturating_pow(exponent);
    base.saturating_mul(factor).min(max)
}
