use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use std::time::Duration;

use crate::config::KafkaConfig;
use crate::models::{DeadLetterRecord, Order, SourcePosition};
use crate::pipeline::{DeadLetterError, DeadLetterPublisher, PublishError};

// ============================================================================
// Redpanda / Kafka producer
// ============================================================================
//
// One FutureProducer serves both outbound channels:
// - orders      (submission path: API + synthetic producer)
// - orders-dlq  (dead-letter dispatcher)
//
// Records are JSON, keyed by order id so one order's events share a partition.
//
// ============================================================================

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands orders to the orders topic (outbound production path)
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    async fn publish_order(&self, order: &Order) -> Result<SourcePosition, PublishError>;
}

pub struct RedpandaClient {
    producer: FutureProducer,
    orders_topic: String,
    dead_letter_topic: String,
}

impl RedpandaClient {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Redpanda producer")?;

        tracing::info!(brokers = %config.brokers, "Redpanda producer initialized");

        Ok(Self {
            producer,
            orders_topic: config.orders_topic.clone(),
            dead_letter_topic: config.dead_letter_topic.clone(),
        })
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<SourcePosition, String> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let rdkafka::producer::future_producer::Delivery { partition, offset, .. } = self
            .producer
            .send(record, rdkafka::util::Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| e.to_string())?;

        Ok(SourcePosition::new(topic, partition, offset))
    }
}

#[async_trait]
impl OrderPublisher for RedpandaClient {
    async fn publish_order(&self, order: &Order) -> Result<SourcePosition, PublishError> {
        let payload = serde_json::to_vec(order)?;

        match self.send(&self.orders_topic, &order.order_id, &payload).await {
            Ok(position) => {
                tracing::info!(
                    order_id = %order.order_id,
                    product = %order.product,
                    price = %format!("{:.2}", order.price),
                    position = %position,
                    "Sent order"
                );
                Ok(position)
            }
            Err(e) => {
                tracing::error!(order_id = %order.order_id, error = %e, "Failed to send order");
                Err(PublishError::Kafka(e))
            }
        }
    }
}

#[async_trait]
impl DeadLetterPublisher for RedpandaClient {
    async fn publish(&self, record: &DeadLetterRecord) -> Result<SourcePosition, DeadLetterError> {
        let payload = serde_json::to_vec(record)?;

        self.send(&self.dead_letter_topic, &record.order.order_id, &payload)
            .await
            .map_err(DeadLetterError::Publish)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory order publisher for the submission path
    #[derive(Default)]
    pub struct RecordingOrderPublisher {
        pub orders: Mutex<Vec<Order>>,
        pub fail: bool,
    }

    impl RecordingOrderPublisher {
        pub fn failing() -> Self {
            Self {
                orders: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn orders(&self) -> Vec<Order> {
            self.orders.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderPublisher for RecordingOrderPublisher {
        async fn publish_order(&self, order: &Order) -> Result<SourcePosition, PublishError> {
            if self.fail {
                return Err(PublishError::Kafka("broker unavailable".to_string()));
            }
            let mut orders = self.orders.lock().unwrap();
            orders.push(order.clone());
            Ok(SourcePosition::new("orders", 0, orders.len() as i64 - 1))
        }
    }
}
