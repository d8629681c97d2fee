//! In-memory broker for tests and local development.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use events::Topology;
use tokio::sync::{Mutex, broadcast};

use crate::{BrokerError, EventBroker, Publication};

/// A message as a consumer would receive it.
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub exchange: String,
    pub routing_key: String,
    pub partition_key: String,
    pub payload: Vec<u8>,
}

/// In-memory [`EventBroker`] backed by a broadcast channel.
///
/// Keeps a log of everything published so tests can assert on delivery
/// order, and can be told to fail the next N publishes to exercise the
/// relay's retry path.
#[derive(Clone)]
pub struct InMemoryBroker {
    sender: broadcast::Sender<DeliveredMessage>,
    log: Arc<Mutex<Vec<DeliveredMessage>>>,
    failures_remaining: Arc<AtomicU32>,
    declared: Arc<Mutex<Vec<Topology>>>,
}

impl InMemoryBroker {
    /// Creates a new in-memory broker.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            sender,
            log: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(AtomicU32::new(0)),
            declared: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribes to everything published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveredMessage> {
        self.sender.subscribe()
    }

    /// Makes the next `n` publish calls fail with [`BrokerError::PublishFailed`].
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Returns every message delivered so far, in publish order.
    pub async fn delivered(&self) -> Vec<DeliveredMessage> {
        self.log.lock().await.clone()
    }

    /// Returns how many times the topology has been declared.
    pub async fn declaration_count(&self) -> usize {
        self.declared.lock().await.len()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroker for InMemoryBroker {
    async fn publish(&self, publication: Publication) -> Result<(), BrokerError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(BrokerError::PublishFailed(
                "injected failure".to_string(),
            ));
        }

        let message = DeliveredMessage {
            exchange: publication.exchange,
            routing_key: publication.routing_key,
            partition_key: publication.partition_key,
            payload: publication.payload,
        };
        self.log.lock().await.push(message.clone());
        // Delivery to live subscribers is best-effort; the log is the
        // source of truth for assertions.
        let _ = self.sender.send(message);
        Ok(())
    }

    async fn declare_topology(&self, topology: &Topology) -> Result<(), BrokerError> {
        self.declared.lock().await.push(topology.clone());
        Ok(())
    }

    async fn close(&self) {}
}
