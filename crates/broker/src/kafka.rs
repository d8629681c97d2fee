//! Kafka-compatible broker transport.

use std::time::Duration;

use async_trait::async_trait;
use events::Topology;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;

use crate::{BrokerError, EventBroker, Publication};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PARTITIONS: i32 = 12;

/// Kafka/Redpanda-backed [`EventBroker`].
///
/// Exchanges become topics. The routing key is carried in a `routing_key`
/// message header so bound consumers can filter, and the partition key is
/// the order id, preserving per-order ordering inside one partition.
pub struct KafkaBroker {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    partitions: i32,
    replication: i32,
}

impl KafkaBroker {
    /// Connects with default settings.
    ///
    /// `brokers` is a comma-separated bootstrap list, e.g. `"localhost:9092"`.
    pub fn connect(brokers: &str) -> Result<Self, BrokerError> {
        Self::builder().brokers(brokers).build()
    }

    /// Creates a builder for custom configuration.
    pub fn builder() -> KafkaBrokerBuilder {
        KafkaBrokerBuilder::default()
    }

    /// Returns the configured bootstrap list.
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    fn admin_client(&self) -> Result<AdminClient<DefaultClientContext>, BrokerError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| BrokerError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl EventBroker for KafkaBroker {
    async fn publish(&self, publication: Publication) -> Result<(), BrokerError> {
        let headers = OwnedHeaders::new().insert(Header {
            key: "routing_key",
            value: Some(publication.routing_key.as_bytes()),
        });

        let record = FutureRecord::to(&publication.exchange)
            .key(&publication.partition_key)
            .payload(&publication.payload)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok(_) => Ok(()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut), _)) => {
                Err(BrokerError::Timeout)
            }
            Err((e, _)) => Err(BrokerError::PublishFailed(e.to_string())),
        }
    }

    async fn declare_topology(&self, topology: &Topology) -> Result<(), BrokerError> {
        let admin = self.admin_client()?;
        let topics: Vec<NewTopic<'_>> = topology
            .exchanges
            .iter()
            .map(|name| {
                NewTopic::new(name, self.partitions, TopicReplication::Fixed(self.replication))
            })
            .collect();

        let results = admin
            .create_topics(topics.iter(), &AdminOptions::new())
            .await
            .map_err(|e| BrokerError::Topology(e.to_string()))?;

        for result in results {
            match result {
                Ok(topic) => tracing::debug!(%topic, "exchange declared"),
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(%topic, "exchange already declared");
                }
                Err((topic, code)) => {
                    return Err(BrokerError::Topology(format!("{topic}: {code}")));
                }
            }
        }

        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(self.timeout)) {
            tracing::warn!(error = %e, "failed to flush producer on close");
        }
    }
}

/// Builder for [`KafkaBroker`].
#[derive(Default)]
pub struct KafkaBrokerBuilder {
    brokers: Option<String>,
    acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    partitions: Option<i32>,
    replication: Option<i32>,
}

impl KafkaBrokerBuilder {
    /// Sets the comma-separated bootstrap servers (required).
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Sets the producer `acks` policy (default: `all`).
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Sets the compression codec.
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Sets the bounded publish timeout (default: 5s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the partition count used when declaring exchanges.
    pub fn partitions(mut self, partitions: i32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Sets the replication factor used when declaring exchanges.
    pub fn replication(mut self, replication: i32) -> Self {
        self.replication = Some(replication);
        self
    }

    /// Builds the broker, creating the underlying producer.
    pub fn build(self) -> Result<KafkaBroker, BrokerError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BrokerError::ConnectionFailed("no brokers configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &brokers)
            .set("acks", self.acks.as_deref().unwrap_or("all"))
            .set("message.timeout.ms", timeout.as_millis().to_string());
        if let Some(compression) = &self.compression {
            config.set("compression.type", compression);
        }

        let producer: FutureProducer = config
            .create()
            .map_err(|e| BrokerError::ConnectionFailed(e.to_string()))?;

        Ok(KafkaBroker {
            producer,
            brokers,
            timeout,
            partitions: self.partitions.unwrap_or(DEFAULT_PARTITIONS),
            replication: self.replication.unwrap_or(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_brokers_fails() {
        let result = KafkaBroker::builder().build();
        assert!(matches!(result, Err(BrokerError::ConnectionFailed(_))));
    }

    #[test]
    fn builder_applies_defaults() {
        // Producer creation does not contact the broker, so this is safe
        // without a running cluster.
        let broker = KafkaBroker::connect("localhost:9092").unwrap();
        assert_eq!(broker.brokers(), "localhost:9092");
        assert_eq!(broker.timeout, DEFAULT_TIMEOUT);
        assert_eq!(broker.partitions, DEFAULT_PARTITIONS);
    }
}
