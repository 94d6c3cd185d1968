use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::ProducerConfig;
use crate::messaging::OrderPublisher;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::utils::wait_for_shutdown;

// ============================================================================
// Order Synthesis & Scheduled Producer
// ============================================================================

pub const PRODUCTS: [&str; 10] = [
    "Item1", "Item2", "Item3", "Item4", "Item5",
    "Laptop", "Phone", "Tablet", "Headphones", "Monitor",
];

pub const MIN_PRICE: f64 = 10.0;
pub const MAX_PRICE: f64 = 1000.0;

/// Source of order ids for synthesized orders
pub trait OrderIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// 1001, 1002, 1003, ...
pub struct SequentialOrderIds {
    next: AtomicU64,
}

impl SequentialOrderIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl OrderIdSource for SequentialOrderIds {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

/// "API-<epoch millis>" ids for orders synthesized on request
pub struct TimestampOrderIds;

impl OrderIdSource for TimestampOrderIds {
    fn next_id(&self) -> String {
        format!("API-{}", Utc::now().timestamp_millis())
    }
}

/// Random product from the catalog, price in [10.00, 1000.00) at cent precision.
pub fn random_order(order_id: String) -> Order {
    let mut rng = rand::rng();
    let product = PRODUCTS[rng.random_range(0..PRODUCTS.len())];
    let price = (rng.random_range(MIN_PRICE..MAX_PRICE) * 100.0).floor() / 100.0;

    Order::new(order_id, product, price)
}

pub struct OrderProducer {
    publisher: Arc<dyn OrderPublisher>,
    ids: Arc<dyn OrderIdSource>,
    metrics: Arc<Metrics>,
    config: ProducerConfig,
}

impl OrderProducer {
    pub fn new(
        publisher: Arc<dyn OrderPublisher>,
        ids: Arc<dyn OrderIdSource>,
        metrics: Arc<Metrics>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            publisher,
            ids,
            metrics,
            config,
        }
    }

    /// Publish one synthesized order per interval until `max_orders` have
    /// been produced or shutdown is requested. Returns the number produced.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        if !self.config.enabled {
            tracing::info!("Order producer disabled");
            return 0;
        }

        let mut interval = tokio::time::interval(Duration::from_millis(self.config.interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            max_orders = self.config.max_orders,
            interval_ms = self.config.interval_ms,
            "Order producer started"
        );

        let mut produced = 0;
        while produced < self.config.max_orders {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!(produced, "Order producer stopped by shutdown");
                    return produced;
                }

                _ = interval.tick() => {}
            }

            let order = random_order(self.ids.next_id());
            let published = self.publisher.publish_order(&order).await;
            if let Err(e) = &published {
                tracing::warn!(order_id = %order.order_id, error = %e, "Synthetic order not published");
            }
            self.metrics.record_publish("producer", published.is_ok());
            produced += 1;
        }

        tracing::info!(produced, "Maximum orders reached. Stopping producer.");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::RecordingOrderPublisher;

    fn producer(publisher: Arc<RecordingOrderPublisher>, config: ProducerConfig) -> OrderProducer {
        OrderProducer::new(
            publisher,
            Arc::new(SequentialOrderIds::starting_at(config.first_order_id)),
            Arc::new(Metrics::new().unwrap()),
            config,
        )
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialOrderIds::starting_at(1001);

        assert_eq!(ids.next_id(), "1001");
        assert_eq!(ids.next_id(), "1002");
        assert_eq!(ids.next_id(), "1003");
    }

    #[test]
    fn test_timestamp_ids_are_prefixed() {
        assert!(TimestampOrderIds.next_id().starts_with("API-"));
    }

    #[test]
    fn test_random_orders_stay_in_catalog_and_range() {
        for i in 0..500 {
            let order = random_order(i.to_string());

            assert!(PRODUCTS.contains(&order.product.as_str()));
            assert!(order.price >= MIN_PRICE && order.price < MAX_PRICE, "{}", order.price);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_stops_after_max_orders() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let config = ProducerConfig {
            enabled: true,
            max_orders: 3,
            interval_ms: 1000,
            first_order_id: 1001,
        };
        let (_tx, shutdown) = watch::channel(false);

        let produced = producer(publisher.clone(), config).run(shutdown).await;

        assert_eq!(produced, 3);
        let ids: Vec<_> = publisher.orders().into_iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec!["1001", "1002", "1003"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_producer_publishes_nothing() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let config = ProducerConfig {
            enabled: false,
            ..ProducerConfig::default()
        };
        let (_tx, shutdown) = watch::channel(false);

        assert_eq!(producer(publisher.clone(), config).run(shutdown).await, 0);
        assert!(publisher.orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failures_do_not_stop_producer() {
        let publisher = Arc::new(RecordingOrderPublisher::failing());
        let config = ProducerConfig {
            enabled: true,
            max_orders: 4,
            interval_ms: 10,
            first_order_id: 1,
        };
        let (_tx, shutdown) = watch::channel(false);

        assert_eq!(producer(publisher, config).run(shutdown).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_producer() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let config = ProducerConfig {
            enabled: true,
            max_orders: 1_000,
            interval_ms: 1000,
            first_order_id: 1001,
        };
        let (tx, shutdown) = watch::channel(false);

        let task = tokio::spawn(producer(publisher.clone(), config).run(shutdown));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send(true).unwrap();

        let produced = task.await.unwrap();
        assert_eq!(produced, 3);
        assert_eq!(publisher.orders().len(), 3);
    }
}
