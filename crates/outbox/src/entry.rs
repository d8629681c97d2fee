use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use events::EventEnvelope;

/// Delivery state of an outbox entry.
///
/// Entries are never deleted by the delivery path itself; a failed entry
/// either becomes retryable or, past the attempt ceiling, dead-lettered
/// for operator attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    /// Staged, not yet attempted.
    Pending,
    /// Acknowledged by the broker.
    Published,
    /// At least one attempt failed; eligible again after backoff.
    FailedRetryable,
    /// Attempt ceiling reached; requires manual intervention.
    DeadLettered,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::FailedRetryable => "failed_retryable",
            OutboxStatus::DeadLettered => "dead_lettered",
        }
    }

    /// Whether the relay should still try to deliver this entry.
    pub fn is_unpublished(&self) -> bool {
        matches!(self, OutboxStatus::Pending | OutboxStatus::FailedRetryable)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "published" => Ok(OutboxStatus::Published),
            "failed_retryable" => Ok(OutboxStatus::FailedRetryable),
            "dead_lettered" => Ok(OutboxStatus::DeadLettered),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// A staged event awaiting publication.
///
/// `position` is assigned by the store on insert and defines the relay's
/// drain order; entries for the same aggregate are always published in
/// position order.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub position: i64,
    pub event_id: EventId,
    pub aggregate_id: OrderId,
    pub event_type: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Stages an envelope for delivery under the given routing key.
    pub fn for_envelope(
        envelope: &EventEnvelope,
        routing_key: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let now = Utc::now();
        Ok(Self {
            position: 0,
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id,
            event_type: envelope.event_type.clone(),
            routing_key: routing_key.into(),
            payload: serde_json::to_value(envelope)?,
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: now,
            created_at: now,
            published_at: None,
        })
    }

    /// Whether this entry is due for an attempt at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_unpublished() && self.next_attempt_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderItem, OrderStatus, ProductId, UserId};
    use events::OrderEvent;

    fn sample_envelope() -> EventEnvelope {
        let event = OrderEvent::created(
            OrderId::new(),
            UserId::new(),
            vec![OrderItem {
                product_id: ProductId::from("sku-1"),
                quantity: 1,
                price: Money::from_cents(1000),
            }],
            Money::from_cents(1000),
            OrderStatus::Pending,
        );
        EventEnvelope::for_event(&event).unwrap()
    }

    #[test]
    fn new_entry_is_pending_with_zero_attempts() {
        let envelope = sample_envelope();
        let entry = OutboxEntry::for_envelope(&envelope, "order.created").unwrap();

        assert_eq!(entry.status, OutboxStatus::Pending);
        assert_eq!(entry.attempts, 0);
        assert_eq!(entry.event_id, envelope.event_id);
        assert_eq!(entry.aggregate_id, envelope.aggregate_id);
        assert_eq!(entry.event_type, "OrderCreated");
        assert!(entry.published_at.is_none());
    }

    #[test]
    fn entry_is_due_immediately_after_staging() {
        let envelope = sample_envelope();
        let entry = OutboxEntry::for_envelope(&envelope, "order.created").unwrap();
        assert!(entry.is_due(Utc::now()));
    }

    #[test]
    fn published_entry_is_never_due() {
        let envelope = sample_envelope();
        let mut entry = OutboxEntry::for_envelope(&envelope, "order.created").unwrap();
        entry.status = OutboxStatus::Published;
        assert!(!entry.is_due(Utc::now()));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Published,
            OutboxStatus::FailedRetryable,
            OutboxStatus::DeadLettered,
        ] {
            assert_eq!(status.as_str().parse::<OutboxStatus>().unwrap(), status);
        }
        assert!("archived".parse::<OutboxStatus>().is_err());
    }
}
