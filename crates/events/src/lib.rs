//! Wire contract between the order service and its downstream consumers.
//!
//! Everything here is public interface: the typed order events, the
//! transport-neutral envelope they travel in, the exchange/queue/routing-key
//! topology they are routed through, and the dedup contract consumers must
//! honor. Renaming any exchange, queue, or routing key is a breaking change
//! requiring a coordinated rollout.

pub mod dedup;
pub mod envelope;
pub mod order;
pub mod topology;

pub use dedup::{InMemoryProcessedLog, ProcessedEventLog, process_once};
pub use envelope::{CodecError, EventEnvelope};
pub use order::{
    OrderCancelledData, OrderCreatedData, OrderEvent, OrderStatusChangedData, OrderUpdatedData,
};
pub use topology::Topology;
