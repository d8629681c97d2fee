//! Relay behavior against the in-memory store and broker.

use std::sync::Arc;
use std::time::Duration;

use broker::InMemoryBroker;
use common::{Money, OrderId, OrderItem, ProductId, UserId};
use events::{EventEnvelope, OrderEvent};
use outbox::{InMemoryOutboxStore, OutboxEntry, OutboxRelay, OutboxStatus, OutboxStore, RelayConfig};

fn fast_config() -> RelayConfig {
    RelayConfig {
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        max_attempts: 4,
        ..RelayConfig::default()
    }
}

fn sample_item() -> OrderItem {
    OrderItem {
        product_id: ProductId::from("sku-1"),
        quantity: 1,
        price: Money::from_cents(2500),
    }
}

async fn stage(store: &InMemoryOutboxStore, event: &OrderEvent) -> OutboxEntry {
    let envelope = EventEnvelope::for_event(event).unwrap();
    let entry = OutboxEntry::for_envelope(&envelope, event.routing_key()).unwrap();
    store.insert(&entry).await.unwrap();
    store.entry(entry.event_id).await.unwrap()
}

async fn drain_until_settled(relay: &OutboxRelay<InMemoryOutboxStore>) {
    for _ in 0..50 {
        let report = relay.drain_once().await.unwrap();
        if report.published == 0 && report.failed == 0 && report.dead_lettered == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("relay did not settle");
}

#[tokio::test]
async fn pending_entries_are_published_and_marked() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    let order_id = OrderId::new();

    let event = OrderEvent::created(
        order_id,
        UserId::new(),
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let entry = stage(&store, &event).await;

    let relay = OutboxRelay::new(store.clone(), broker.clone(), fast_config());
    let report = relay.drain_once().await.unwrap();

    assert_eq!(report.published, 1);
    let stored = store.entry(entry.event_id).await.unwrap();
    assert_eq!(stored.status, OutboxStatus::Published);
    assert!(stored.published_at.is_some());

    let delivered = broker.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].exchange, "order.exchange");
    assert_eq!(delivered[0].routing_key, "order.created");
    assert_eq!(delivered[0].partition_key, order_id.to_string());

    // The payload on the wire is the full envelope.
    let envelope: EventEnvelope = serde_json::from_slice(&delivered[0].payload).unwrap();
    assert_eq!(envelope.event_type, "OrderCreated");
    assert_eq!(envelope.aggregate_id, order_id);
}

#[tokio::test]
async fn transient_failures_are_retried_until_acknowledged() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    broker.fail_next(3);

    let event = OrderEvent::created(
        OrderId::new(),
        UserId::new(),
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let entry = stage(&store, &event).await;

    let relay = OutboxRelay::new(store.clone(), broker.clone(), fast_config());
    drain_until_settled(&relay).await;

    let stored = store.entry(entry.event_id).await.unwrap();
    assert_eq!(stored.status, OutboxStatus::Published);
    assert_eq!(stored.attempts, 3);
    // Exactly one copy reached the broker despite the retries.
    assert_eq!(broker.delivered().await.len(), 1);
}

#[tokio::test]
async fn exhausted_entries_are_dead_lettered_not_dropped() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    broker.fail_next(u32::MAX);

    let event = OrderEvent::cancelled(OrderId::new(), UserId::new(), "requested by customer");
    let entry = stage(&store, &event).await;

    let relay = OutboxRelay::new(store.clone(), broker.clone(), fast_config());
    drain_until_settled(&relay).await;

    let stored = store.entry(entry.event_id).await.unwrap();
    assert_eq!(stored.status, OutboxStatus::DeadLettered);
    assert_eq!(stored.attempts, 4);
    assert!(broker.delivered().await.is_empty());
}

#[tokio::test]
async fn dead_lettering_parks_the_rest_of_the_order() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    let order_id = OrderId::new();
    let user_id = UserId::new();

    let created = OrderEvent::created(
        order_id,
        user_id,
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let changed = OrderEvent::status_changed(
        order_id,
        common::OrderStatus::Pending,
        common::OrderStatus::Confirmed,
    );
    let other = OrderEvent::created(
        OrderId::new(),
        UserId::new(),
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let dead = stage(&store, &created).await;
    let parked = stage(&store, &changed).await;
    stage(&store, &other).await;

    // One attempt allowed: the first failure dead-letters the entry.
    broker.fail_next(1);
    let config = RelayConfig {
        max_attempts: 1,
        ..fast_config()
    };
    let relay = OutboxRelay::new(store.clone(), broker.clone(), config);
    drain_until_settled(&relay).await;

    assert_eq!(
        store.entry(dead.event_id).await.unwrap().status,
        OutboxStatus::DeadLettered
    );
    // The status change never overtakes the parked creation; only the
    // unrelated order is published.
    assert_eq!(
        store.entry(parked.event_id).await.unwrap().status,
        OutboxStatus::Pending
    );
    let delivered = broker.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].partition_key, other.order_id().to_string());
}

#[tokio::test]
async fn relay_stops_when_the_shutdown_channel_closes() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    let relay = OutboxRelay::new(store, broker, fast_config());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { relay.run(shutdown_rx).await });
    drop(shutdown_tx);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("relay kept running after its shutdown channel closed")
        .unwrap();
}

#[tokio::test]
async fn per_order_publish_order_survives_a_failure() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());
    let order_id = OrderId::new();
    let user_id = UserId::new();

    let created = OrderEvent::created(
        order_id,
        user_id,
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let changed = OrderEvent::status_changed(
        order_id,
        common::OrderStatus::Pending,
        common::OrderStatus::Confirmed,
    );
    stage(&store, &created).await;
    stage(&store, &changed).await;

    // The first publish fails; the status change must not overtake it.
    broker.fail_next(1);
    let relay = OutboxRelay::new(store.clone(), broker.clone(), fast_config());
    let report = relay.drain_once().await.unwrap();
    assert_eq!(report.published, 0);
    assert_eq!(report.failed, 1);
    assert!(broker.delivered().await.is_empty());

    drain_until_settled(&relay).await;

    let delivered = broker.delivered().await;
    let routing_keys: Vec<&str> = delivered.iter().map(|m| m.routing_key.as_str()).collect();
    assert_eq!(routing_keys, vec!["order.created", "order.status.changed"]);
}

#[tokio::test]
async fn a_stalled_order_does_not_block_other_orders() {
    let store = InMemoryOutboxStore::new();
    let broker = Arc::new(InMemoryBroker::new());

    let stalled = OrderEvent::created(
        OrderId::new(),
        UserId::new(),
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    let healthy = OrderEvent::created(
        OrderId::new(),
        UserId::new(),
        vec![sample_item()],
        Money::from_cents(2500),
        common::OrderStatus::Pending,
    );
    stage(&store, &stalled).await;
    stage(&store, &healthy).await;

    // Fail the stalled order's publish; the healthy order still goes out
    // in the same cycle.
    broker.fail_next(1);
    let config = RelayConfig {
        base_backoff: Duration::from_secs(60),
        max_backoff: Duration::from_secs(60),
        ..fast_config()
    };
    let relay = OutboxRelay::new(store.clone(), broker.clone(), config);
    let report = relay.drain_once().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.published, 1);
    let delivered = broker.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].partition_key, healthy.order_id().to_string());

    // While the stalled entry waits out its backoff, further drains leave
    // it untouched.
    let report = relay.drain_once().await.unwrap();
    assert_eq!(report.published, 0);
    assert_eq!(report.failed, 0);
}
