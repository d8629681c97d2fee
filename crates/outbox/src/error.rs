use thiserror::Error;

/// Errors produced by outbox stores.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row held data the store could not interpret.
    #[error("corrupt outbox entry: {0}")]
    Corrupt(String),
}
