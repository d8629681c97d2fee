//! Order lifecycle domain.
//!
//! [`Order`] enforces the status state machine and item invariants;
//! [`OrderService`] executes commands against an [`OrderRepository`],
//! staging every resulting event in the outbox atomically with the state
//! change. No broker I/O happens in the command path.

mod error;
mod memory;
pub mod order;
mod postgres;
mod repository;

pub use error::OrderError;
pub use memory::InMemoryOrderRepository;
pub use order::{CancelOrder, CreateOrder, Order, OrderService, UpdateOrder};
pub use postgres::PostgresOrderRepository;
pub use repository::{OrderRepository, RepositoryError};
