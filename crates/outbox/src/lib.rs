//! Transactional outbox.
//!
//! Events are staged in an outbox table inside the same database
//! transaction as the state change that produced them, then published to
//! the broker by a background [`OutboxRelay`]. Delivery is at-least-once;
//! consumers deduplicate on the envelope's event id.

mod entry;
mod error;
mod memory;
mod postgres;
mod relay;
mod store;

pub use entry::{OutboxEntry, OutboxStatus};
pub use error::OutboxError;
pub use memory::InMemoryOutboxStore;
pub use postgres::{PostgresOutboxStore, insert_entry};
pub use relay::{DrainReport, OutboxRelay, RelayConfig};
pub use store::OutboxStore;
