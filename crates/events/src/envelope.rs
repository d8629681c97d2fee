//! Transport-neutral event envelope and codec.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderEvent;

/// Errors produced when encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The envelope names an event type this schema version does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}

/// The envelope every domain event travels in.
///
/// This is the wire contract with all downstream services: a consumer that
/// can decode the envelope can dispatch on `event_type` without knowing the
/// producing service's internals. `aggregate_id` doubles as the broker
/// partition key, which is what keeps per-order delivery ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Unique id of this event; the consumer-side dedup key.
    pub event_id: EventId,

    /// Event type name (e.g. `"OrderCreated"`).
    pub event_type: String,

    /// The order this event belongs to.
    pub aggregate_id: OrderId,

    /// The variant payload as a JSON object.
    pub payload: serde_json::Value,

    /// When the event occurred in the producing service.
    pub occurred_at: DateTime<Utc>,

    /// Optional request correlation id threaded through for tracing.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,
}

impl EventEnvelope {
    /// Wraps a domain event in a fresh envelope with a new event id.
    pub fn for_event(event: &OrderEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: EventId::new(),
            event_type: event.event_type().to_string(),
            aggregate_id: event.order_id(),
            payload: event.payload_json()?,
            occurred_at: event.occurred_at(),
            correlation_id: None,
        })
    }

    /// Attaches a correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Encodes the envelope to its wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an envelope from wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reconstructs the typed domain event from the envelope.
    pub fn order_event(&self) -> Result<OrderEvent, CodecError> {
        let payload = self.payload.clone();
        match self.event_type.as_str() {
            "OrderCreated" => Ok(OrderEvent::Created(serde_json::from_value(payload)?)),
            "OrderStatusChanged" => Ok(OrderEvent::StatusChanged(serde_json::from_value(payload)?)),
            "OrderUpdated" => Ok(OrderEvent::Updated(serde_json::from_value(payload)?)),
            "OrderCancelled" => Ok(OrderEvent::Cancelled(serde_json::from_value(payload)?)),
            other => Err(CodecError::UnknownEventType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderItem, OrderStatus, UserId};

    fn sample_event() -> OrderEvent {
        OrderEvent::created(
            OrderId::new(),
            UserId::new(),
            vec![OrderItem::new("SKU-001", 2, Money::from_cents(1000))],
            Money::from_cents(2000),
            OrderStatus::Pending,
        )
    }

    #[test]
    fn for_event_fills_envelope_fields() {
        let event = sample_event();
        let envelope = EventEnvelope::for_event(&event).unwrap();

        assert_eq!(envelope.event_type, "OrderCreated");
        assert_eq!(envelope.aggregate_id, event.order_id());
        assert_eq!(envelope.occurred_at, event.occurred_at());
        assert!(envelope.correlation_id.is_none());
    }

    #[test]
    fn fresh_envelopes_get_distinct_event_ids() {
        let event = sample_event();
        let a = EventEnvelope::for_event(&event).unwrap();
        let b = EventEnvelope::for_event(&event).unwrap();
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn decode_recovers_typed_event() {
        let event = sample_event();
        let envelope = EventEnvelope::for_event(&event)
            .unwrap()
            .with_correlation_id("req-42");

        let bytes = envelope.encode().unwrap();
        let decoded = EventEnvelope::decode(&bytes).unwrap();

        assert_eq!(decoded, envelope);
        assert_eq!(decoded.order_event().unwrap(), event);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let event = sample_event();
        let mut envelope = EventEnvelope::for_event(&event).unwrap();
        envelope.event_type = "OrderTeleported".to_string();

        assert!(matches!(
            envelope.order_event(),
            Err(CodecError::UnknownEventType(_))
        ));
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let envelope = EventEnvelope::for_event(&sample_event()).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&envelope.encode().unwrap()).unwrap();

        assert!(json.get("eventId").is_some());
        assert!(json.get("eventType").is_some());
        assert!(json.get("aggregateId").is_some());
        assert!(json.get("occurredAt").is_some());
        // Absent correlation ids are omitted, not null.
        assert!(json.get("correlationId").is_none());
    }
}
