//! Command execution against the repository.

use common::{OrderId, UserId};
use events::{EventEnvelope, OrderEvent};
use outbox::OutboxEntry;

use crate::order::{CancelOrder, CreateOrder, Order, UpdateOrder};
use crate::{OrderError, OrderRepository, RepositoryError};

/// Executes order commands.
///
/// Every successful command that changes state persists the order and its
/// events in one repository transaction; publication happens later, from
/// the relay. Nothing here talks to the broker.
pub struct OrderService<R: OrderRepository> {
    repository: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    #[tracing::instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order, OrderError> {
        let (order, event) = Order::create(
            command.user_id,
            command.items,
            command.shipping_address,
            command.notes,
        )?;
        let entry = stage(&event)?;
        self.repository.insert(&order, &entry).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total_amount(), "order created");
        Ok(order)
    }

    /// Applies an optional detail edit and an optional status change as one
    /// atomic command.
    ///
    /// Both halves are validated against the loaded aggregate before
    /// anything is written; a rejected half rejects the whole command, and
    /// every event the command produces commits in the same repository
    /// transaction as the order row.
    #[tracing::instrument(skip(self, command), fields(order_id = %command.order_id))]
    pub async fn update_order(&self, command: UpdateOrder) -> Result<Order, OrderError> {
        if command.new_status.is_none()
            && command.shipping_address.is_none()
            && command.notes.is_none()
        {
            return Err(OrderError::Validation("nothing to update".to_string()));
        }

        let mut order = self.load(command.order_id).await?;
        let expected = order.version();

        let mut events = Vec::new();
        if command.shipping_address.is_some() || command.notes.is_some() {
            events.push(order.update_details(command.shipping_address, command.notes)?);
        }
        let mut status_changed = false;
        if let Some(new_status) = command.new_status {
            if let Some(event) = order.change_status(new_status)? {
                status_changed = true;
                events.push(event);
            }
        }

        if events.is_empty() {
            // The only requested change was the status the order already
            // has; nothing to persist, nothing to emit.
            return Ok(order);
        }

        order.advance_version();
        let entries = events.iter().map(stage).collect::<Result<Vec<_>, _>>()?;
        self.persist(&order, expected, &entries).await?;

        if status_changed {
            metrics::counter!("order_status_changes_total").increment(1);
        }
        tracing::info!(status = %order.status(), events = entries.len(), "order updated");
        Ok(order)
    }

    #[tracing::instrument(skip(self, command), fields(order_id = %command.order_id))]
    pub async fn cancel_order(&self, command: CancelOrder) -> Result<Order, OrderError> {
        let mut order = self.load(command.order_id).await?;
        let expected = order.version();

        let Some(event) = order.cancel(command.user_id, command.reason)? else {
            return Ok(order);
        };

        order.advance_version();
        let entry = stage(&event)?;
        self.persist(&order, expected, &[entry]).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!("order cancelled");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.load(order_id).await
    }

    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.repository.find_by_user(user_id).await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.repository
            .find(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    async fn persist(
        &self,
        order: &Order,
        expected: common::Version,
        entries: &[OutboxEntry],
    ) -> Result<(), OrderError> {
        match self.repository.update(order, expected, entries).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::Conflict) => Err(OrderError::Conflict(order.id())),
            Err(e) => Err(e.into()),
        }
    }
}

fn stage(event: &OrderEvent) -> Result<OutboxEntry, OrderError> {
    let envelope = EventEnvelope::for_event(event)?;
    Ok(OutboxEntry::for_envelope(&envelope, event.routing_key())?)
}
