//! Shared vocabulary for the eventflow services.
//!
//! This crate holds the types that cross service boundaries: identifier
//! newtypes, the order status state machine, money, and order items. Both
//! the order service and every downstream consumer depend on these shapes,
//! so they change only with coordinated rollouts.

pub mod ids;
pub mod items;
pub mod money;
pub mod status;
pub mod version;

pub use ids::{EventId, OrderId, UserId};
pub use items::{OrderItem, ProductId};
pub use money::Money;
pub use status::OrderStatus;
pub use version::Version;
