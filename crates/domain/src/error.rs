use common::{OrderId, OrderStatus};
use thiserror::Error;

use crate::RepositoryError;

/// Errors surfaced by order commands.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The command carried invalid data.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No visible order matches the request.
    ///
    /// Also returned when the caller does not own the order, so existence
    /// is never leaked across users.
    #[error("order not found")]
    NotFound,

    /// The requested status change is not a legal edge of the lifecycle.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A concurrent writer got there first; retry with fresh state.
    #[error("concurrent modification of order {0}")]
    Conflict(OrderId),

    /// Event payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
