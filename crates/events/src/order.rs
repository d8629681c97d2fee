//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItem, OrderStatus, UserId};
use serde::{Deserialize, Serialize};

use crate::topology::patterns;

/// Events emitted by the order lifecycle.
///
/// Each variant corresponds to one committed order mutation. Events are
/// immutable value objects once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A new order was placed.
    Created(OrderCreatedData),

    /// The order moved to a new lifecycle status.
    StatusChanged(OrderStatusChangedData),

    /// Shipping address or notes changed without a status transition.
    Updated(OrderUpdatedData),

    /// The order was cancelled.
    Cancelled(OrderCancelledData),
}

/// Payload for `OrderCreated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Payload for `OrderStatusChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangedData {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Payload for `OrderUpdated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdatedData {
    pub order_id: OrderId,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Payload for `OrderCancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Creates an `OrderCreated` event.
    pub fn created(
        order_id: OrderId,
        user_id: UserId,
        items: Vec<OrderItem>,
        total_amount: Money,
        status: OrderStatus,
    ) -> Self {
        OrderEvent::Created(OrderCreatedData {
            order_id,
            user_id,
            items,
            total_amount,
            status,
            occurred_at: Utc::now(),
        })
    }

    /// Creates an `OrderStatusChanged` event.
    pub fn status_changed(
        order_id: OrderId,
        previous_status: OrderStatus,
        new_status: OrderStatus,
    ) -> Self {
        OrderEvent::StatusChanged(OrderStatusChangedData {
            order_id,
            previous_status,
            new_status,
            occurred_at: Utc::now(),
        })
    }

    /// Creates an `OrderUpdated` event.
    pub fn updated(
        order_id: OrderId,
        shipping_address: Option<String>,
        notes: Option<String>,
    ) -> Self {
        OrderEvent::Updated(OrderUpdatedData {
            order_id,
            shipping_address,
            notes,
            occurred_at: Utc::now(),
        })
    }

    /// Creates an `OrderCancelled` event.
    pub fn cancelled(order_id: OrderId, user_id: UserId, reason: impl Into<String>) -> Self {
        OrderEvent::Cancelled(OrderCancelledData {
            order_id,
            user_id,
            reason: reason.into(),
            occurred_at: Utc::now(),
        })
    }

    /// Returns the event type name used in the envelope.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::Updated(_) => "OrderUpdated",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }

    /// Returns the routing key the event is published under.
    pub fn routing_key(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => patterns::ORDER_CREATED,
            OrderEvent::StatusChanged(_) => patterns::ORDER_STATUS_CHANGED,
            OrderEvent::Updated(_) => patterns::ORDER_UPDATED,
            OrderEvent::Cancelled(_) => patterns::ORDER_CANCELLED,
        }
    }

    /// Returns the order this event belongs to.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Created(data) => data.order_id,
            OrderEvent::StatusChanged(data) => data.order_id,
            OrderEvent::Updated(data) => data.order_id,
            OrderEvent::Cancelled(data) => data.order_id,
        }
    }

    /// Returns when the event occurred.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created(data) => data.occurred_at,
            OrderEvent::StatusChanged(data) => data.occurred_at,
            OrderEvent::Updated(data) => data.occurred_at,
            OrderEvent::Cancelled(data) => data.occurred_at,
        }
    }

    /// Serializes the variant payload to the wire JSON object.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            OrderEvent::Created(data) => serde_json::to_value(data),
            OrderEvent::StatusChanged(data) => serde_json::to_value(data),
            OrderEvent::Updated(data) => serde_json::to_value(data),
            OrderEvent::Cancelled(data) => serde_json::to_value(data),
        }
    }
}
