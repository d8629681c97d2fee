//! Commands accepted by the order service.

use common::{OrderId, OrderItem, OrderStatus, UserId};
use serde::Deserialize;

/// Places a new order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Updates an order: an optional status change plus optional detail edits,
/// applied and persisted as one atomic command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrder {
    pub order_id: OrderId,
    #[serde(default)]
    pub new_status: Option<OrderStatus>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateOrder {
    /// A pure status change.
    pub fn status_change(order_id: OrderId, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            new_status: Some(new_status),
            shipping_address: None,
            notes: None,
        }
    }
}

/// Cancels an order on behalf of its owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub reason: Option<String>,
}
