//! Order line items.

use serde::{Deserialize, Serialize};

use crate::Money;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A line item in an order.
///
/// The wire shape (`{productId, quantity, price}`) is shared with every
/// downstream service through the `OrderCreated` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// The product being ordered.
    pub product_id: ProductId,

    /// Quantity ordered, at least 1.
    pub quantity: u32,

    /// Unit price at the time the order was placed.
    pub price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
        }
    }

    /// Returns the total price for this line (quantity x unit price).
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}
