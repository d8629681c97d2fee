use async_trait::async_trait;
use common::{OrderId, UserId, Version};
use outbox::{OutboxEntry, OutboxError};
use thiserror::Error;

use crate::Order;

/// Errors produced by order repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored state could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The outbox insert inside the transaction failed.
    #[error(transparent)]
    Outbox(#[from] OutboxError),

    /// The expected version did not match the stored row.
    #[error("version conflict")]
    Conflict,

    /// A stored row held data the repository could not interpret.
    #[error("corrupt order row: {0}")]
    Corrupt(String),
}

/// Persistence for orders and their staged events.
///
/// Writes are transactional: the order row and its outbox entries commit
/// together or not at all. `update` applies an optimistic version check
/// against `expected` and fails with [`RepositoryError::Conflict`] when a
/// concurrent writer has moved the row.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order together with its creation event.
    async fn insert(&self, order: &Order, entry: &OutboxEntry) -> Result<(), RepositoryError>;

    /// Persists an updated order together with any events it produced.
    async fn update(
        &self,
        order: &Order,
        expected: Version,
        entries: &[OutboxEntry],
    ) -> Result<(), RepositoryError>;

    /// Loads an order by id.
    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Loads every order belonging to a user, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;
}
