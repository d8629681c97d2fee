use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItem, OrderStatus, UserId, Version};
use events::OrderEvent;

use crate::OrderError;

/// An order moving through its lifecycle.
///
/// State changes go through the methods here, which validate the requested
/// change against the status machine and return the event that records it.
/// The version only advances when the service persists a change, so a
/// rejected command leaves no trace.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    shipping_address: Option<String>,
    notes: Option<String>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order, returning it with its creation event.
    pub fn create(
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: Option<String>,
        notes: Option<String>,
    ) -> Result<(Self, OrderEvent), OrderError> {
        if items.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::Validation(format!(
                    "item {} has zero quantity",
                    item.product_id
                )));
            }
            if item.price.is_negative() {
                return Err(OrderError::Validation(format!(
                    "item {} has a negative price",
                    item.product_id
                )));
            }
        }

        let now = Utc::now();
        let total_amount: Money = items.iter().map(OrderItem::line_total).sum();
        let order = Self {
            id: OrderId::new(),
            user_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            shipping_address,
            notes,
            version: Version::first(),
            created_at: now,
            updated_at: now,
        };
        let event = OrderEvent::created(
            order.id,
            order.user_id,
            order.items.clone(),
            order.total_amount,
            order.status,
        );
        Ok((order, event))
    }

    /// Rehydrates an order from stored state.
    ///
    /// The total is recomputed from the items rather than trusted from
    /// storage.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        items: Vec<OrderItem>,
        status: OrderStatus,
        shipping_address: Option<String>,
        notes: Option<String>,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let total_amount = items.iter().map(OrderItem::line_total).sum();
        Self {
            id,
            user_id,
            items,
            total_amount,
            status,
            shipping_address,
            notes,
            version,
            created_at,
            updated_at,
        }
    }

    /// Moves the order to a new status.
    ///
    /// Requesting the current status is an idempotent no-op and returns
    /// `Ok(None)`; any edge the status machine does not allow is an
    /// [`OrderError::InvalidTransition`].
    pub fn change_status(
        &mut self,
        new_status: OrderStatus,
    ) -> Result<Option<OrderEvent>, OrderError> {
        if new_status == self.status {
            return Ok(None);
        }
        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let previous = self.status;
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(Some(OrderEvent::status_changed(self.id, previous, new_status)))
    }

    /// Cancels the order on behalf of its owner.
    ///
    /// A caller who does not own the order gets [`OrderError::NotFound`],
    /// the same answer as for an order that does not exist. Cancelling an
    /// already cancelled order is a no-op.
    pub fn cancel(
        &mut self,
        caller: UserId,
        reason: Option<String>,
    ) -> Result<Option<OrderEvent>, OrderError> {
        if caller != self.user_id {
            return Err(OrderError::NotFound);
        }
        if self.status == OrderStatus::Cancelled {
            return Ok(None);
        }
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        let reason = reason.unwrap_or_else(|| "cancelled by customer".to_string());
        Ok(Some(OrderEvent::cancelled(self.id, self.user_id, reason)))
    }

    /// Updates the mutable order details.
    ///
    /// Shipping address and notes stay editable until the order reaches a
    /// terminal status. The item list never changes after creation, so a
    /// confirmed order is never silently re-priced.
    pub fn update_details(
        &mut self,
        shipping_address: Option<String>,
        notes: Option<String>,
    ) -> Result<OrderEvent, OrderError> {
        if shipping_address.is_none() && notes.is_none() {
            return Err(OrderError::Validation("nothing to update".to_string()));
        }
        if self.status.is_terminal() {
            return Err(OrderError::Validation(format!(
                "cannot update an order in status {}",
                self.status
            )));
        }

        if let Some(address) = shipping_address {
            self.shipping_address = Some(address);
        }
        if let Some(notes) = notes {
            self.notes = Some(notes);
        }
        self.updated_at = Utc::now();
        Ok(OrderEvent::updated(
            self.id,
            self.shipping_address.clone(),
            self.notes.clone(),
        ))
    }

    /// Advances the version after a successful persist.
    pub fn advance_version(&mut self) {
        self.version = self.version.next();
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> Option<&str> {
        self.shipping_address.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
