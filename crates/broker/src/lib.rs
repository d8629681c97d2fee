//! Broker transport for outbox publications.
//!
//! The relay publishes through the [`EventBroker`] trait; production wiring
//! uses [`KafkaBroker`] and tests use [`InMemoryBroker`]. Exchanges map to
//! topics, the routing key travels as a message header, and the aggregate id
//! is the partition key, so events sharing it are delivered in publish order.

mod error;
mod kafka;
mod memory;

pub use error::BrokerError;
pub use kafka::KafkaBroker;
pub use memory::{DeliveredMessage, InMemoryBroker};

use async_trait::async_trait;
use events::Topology;

/// A single message handed to the broker.
#[derive(Debug, Clone)]
pub struct Publication {
    /// Target exchange (topic).
    pub exchange: String,

    /// Dotted routing-key pattern, e.g. `order.status.changed`.
    pub routing_key: String,

    /// Partition key; the order id, so per-order ordering survives.
    pub partition_key: String,

    /// Encoded event envelope.
    pub payload: Vec<u8>,
}

/// Connection to the message broker.
///
/// Implementations are constructed explicitly at startup, passed into the
/// relay, and closed explicitly on shutdown.
#[async_trait]
pub trait EventBroker: Send + Sync {
    /// Publishes one message and awaits broker acknowledgment.
    ///
    /// The attempt carries a bounded timeout; exceeding it is a publish
    /// failure, never an indefinite block.
    async fn publish(&self, publication: Publication) -> Result<(), BrokerError>;

    /// Declares the routing topology.
    ///
    /// Idempotent: safe to call on every service startup.
    async fn declare_topology(&self, topology: &Topology) -> Result<(), BrokerError>;

    /// Flushes in-flight messages and releases the connection.
    async fn close(&self);
}
