//! The order aggregate and its command surface.

mod aggregate;
mod commands;
mod service;

pub use aggregate::Order;
pub use commands::{CancelOrder, CreateOrder, UpdateOrder};
pub use service::OrderService;
