//! In-memory order repository for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId, Version};
use outbox::{InMemoryOutboxStore, OutboxEntry, OutboxStore};
use tokio::sync::RwLock;

use crate::{Order, OrderRepository, RepositoryError};

/// In-memory [`OrderRepository`] with the same atomicity and version
/// semantics as the Postgres repository.
///
/// Shares an [`InMemoryOutboxStore`] so a relay wired to the same store
/// sees exactly what a committed transaction would have staged.
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryOrderRepository {
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            outbox,
        }
    }

    /// The outbox store shared with this repository.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order, entry: &OutboxEntry) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id(), order.clone());
        self.outbox.insert(entry).await?;
        Ok(())
    }

    async fn update(
        &self,
        order: &Order,
        expected: Version,
        entries: &[OutboxEntry],
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let stored = orders.get(&order.id()).ok_or(RepositoryError::Conflict)?;
        if stored.version() != expected {
            return Err(RepositoryError::Conflict);
        }

        orders.insert(order.id(), order.clone());
        for entry in entries {
            self.outbox.insert(entry).await?;
        }
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(matching)
    }
}
