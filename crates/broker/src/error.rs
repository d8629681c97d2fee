use thiserror::Error;

/// Errors produced by broker transports.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker connection could not be established.
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),

    /// A publish attempt was rejected or the broker was unreachable.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The publish attempt exceeded its bounded timeout.
    #[error("publish timed out")]
    Timeout,

    /// Topology declaration failed.
    #[error("topology declaration failed: {0}")]
    Topology(String),
}
