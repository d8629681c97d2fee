//! Declarative broker topology.
//!
//! One exchange per bounded context, durable queues bound by routing-key
//! filters. The layout is fixed: services redeclare it on startup (the
//! declaration is idempotent) and never alter it at runtime.

/// Exchange names, one per bounded context.
pub mod exchanges {
    pub const ORDER: &str = "order.exchange";
    pub const PAYMENT: &str = "payment.exchange";
    pub const INVENTORY: &str = "inventory.exchange";
    pub const NOTIFICATION: &str = "notification.exchange";
}

/// Durable queue names, one per consuming service.
pub mod queues {
    pub const ORDER: &str = "order.queue";
    pub const PAYMENT: &str = "payment.queue";
    pub const INVENTORY: &str = "inventory.queue";
    pub const NOTIFICATION: &str = "notification.queue";
}

/// Dotted routing-key patterns for every event in the contract.
pub mod patterns {
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_UPDATED: &str = "order.updated";
    pub const ORDER_STATUS_CHANGED: &str = "order.status.changed";
    pub const ORDER_CANCELLED: &str = "order.cancelled";

    pub const PAYMENT_INITIATED: &str = "payment.initiated";
    pub const PAYMENT_PROCESSED: &str = "payment.processed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";

    pub const INVENTORY_RESERVED: &str = "inventory.reserved";
    pub const INVENTORY_RELEASED: &str = "inventory.released";
    pub const INVENTORY_UPDATED: &str = "inventory.updated";
    pub const INVENTORY_LOW_STOCK: &str = "inventory.low.stock";
}

/// Returns the exchange a routing key is published to.
pub fn exchange_for(routing_key: &str) -> &'static str {
    match routing_key.split('.').next() {
        Some("payment") => exchanges::PAYMENT,
        Some("inventory") => exchanges::INVENTORY,
        Some("notification") => exchanges::NOTIFICATION,
        _ => exchanges::ORDER,
    }
}

/// A queue bound to an exchange with the routing keys it is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub queue: &'static str,
    pub exchange: &'static str,
    pub routing_keys: &'static [&'static str],
}

/// The full routing layout shared by all services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchanges: Vec<&'static str>,
    pub bindings: Vec<Binding>,
}

impl Topology {
    /// The standard eventflow topology.
    pub fn standard() -> Self {
        Self {
            exchanges: vec![
                exchanges::ORDER,
                exchanges::PAYMENT,
                exchanges::INVENTORY,
                exchanges::NOTIFICATION,
            ],
            bindings: vec![
                // Payment reacts to new and cancelled orders.
                Binding {
                    queue: queues::PAYMENT,
                    exchange: exchanges::ORDER,
                    routing_keys: &[patterns::ORDER_CREATED, patterns::ORDER_CANCELLED],
                },
                // Inventory reserves on creation, releases on cancellation.
                Binding {
                    queue: queues::INVENTORY,
                    exchange: exchanges::ORDER,
                    routing_keys: &[patterns::ORDER_CREATED, patterns::ORDER_CANCELLED],
                },
                // Notification follows the whole order lifecycle.
                Binding {
                    queue: queues::NOTIFICATION,
                    exchange: exchanges::ORDER,
                    routing_keys: &[
                        patterns::ORDER_CREATED,
                        patterns::ORDER_UPDATED,
                        patterns::ORDER_STATUS_CHANGED,
                        patterns::ORDER_CANCELLED,
                    ],
                },
                // The order service consumes payment and inventory outcomes.
                Binding {
                    queue: queues::ORDER,
                    exchange: exchanges::PAYMENT,
                    routing_keys: &[patterns::PAYMENT_PROCESSED, patterns::PAYMENT_FAILED],
                },
                Binding {
                    queue: queues::ORDER,
                    exchange: exchanges::INVENTORY,
                    routing_keys: &[patterns::INVENTORY_RESERVED, patterns::INVENTORY_RELEASED],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_topology_declares_all_exchanges() {
        let topology = Topology::standard();
        assert_eq!(topology.exchanges.len(), 4);
        assert!(topology.exchanges.contains(&exchanges::ORDER));
        assert!(topology.exchanges.contains(&exchanges::NOTIFICATION));
    }

    #[test]
    fn every_binding_references_a_declared_exchange() {
        let topology = Topology::standard();
        for binding in &topology.bindings {
            assert!(
                topology.exchanges.contains(&binding.exchange),
                "binding for {} references undeclared exchange {}",
                binding.queue,
                binding.exchange
            );
        }
    }

    #[test]
    fn exchange_for_routes_by_prefix() {
        assert_eq!(exchange_for(patterns::ORDER_CREATED), exchanges::ORDER);
        assert_eq!(exchange_for(patterns::ORDER_STATUS_CHANGED), exchanges::ORDER);
        assert_eq!(exchange_for(patterns::PAYMENT_FAILED), exchanges::PAYMENT);
        assert_eq!(exchange_for(patterns::INVENTORY_LOW_STOCK), exchanges::INVENTORY);
    }
}
