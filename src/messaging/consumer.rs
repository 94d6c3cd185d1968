use anyhow::{Context, Result};
use futures_util::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::KafkaConfig;
use crate::metrics::Metrics;
use crate::models::{DeadLetterRecord, Order, SourcePosition};
use crate::pipeline::{log_dead_letter, Acknowledge, ConsumptionPipeline};
use crate::utils::wait_for_shutdown;

// ============================================================================
// Kafka stream consumer
// ============================================================================
//
// Manual offset management: nothing is committed until the pipeline
// acknowledges a message, and the commit is `offset + 1` for that message's
// partition.
//
// Orders topic: each partition gets its own worker task fed by a bounded
// channel. Messages of one partition are handled strictly in order, so
// commits stay monotonic; different partitions proceed independently, so a
// message sitting in backoff only holds up its own partition.
//
// Dead-letter topic: a single passive loop that logs and acknowledges.
//
// ============================================================================

/// Owned copy of a consumed record, safe to move across await points
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub position: SourcePosition,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        Self {
            position: SourcePosition::new(msg.topic(), msg.partition(), msg.offset()),
            key,
            payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Commits one message's position on the shared consumer
pub struct KafkaAck {
    consumer: Arc<StreamConsumer>,
    position: SourcePosition,
}

impl KafkaAck {
    fn new(consumer: Arc<StreamConsumer>, position: SourcePosition) -> Self {
        Self { consumer, position }
    }
}

impl Acknowledge for KafkaAck {
    fn acknowledge(self) {
        let mut tpl = TopicPartitionList::new();
        if let Err(e) = tpl.add_partition_offset(
            &self.position.topic,
            self.position.partition,
            Offset::Offset(self.position.offset + 1),
        ) {
            tracing::error!(position = %self.position, error = %e, "Invalid commit position");
            return;
        }

        if let Err(e) = self.consumer.commit(&tpl, CommitMode::Async) {
            tracing::error!(position = %self.position, error = %e, "Failed to commit offset");
        }
    }
}

struct PartitionWorker {
    tx: mpsc::Sender<InboundMessage>,
    handle: JoinHandle<()>,
}

pub struct OrderStreamConsumer {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl OrderStreamConsumer {
    pub fn new(config: &KafkaConfig, topic: &str, group_id: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[topic])
            .context("Failed to subscribe to Kafka topic")?;

        tracing::info!(brokers = %config.brokers, topic, group_id, "Kafka consumer subscribed");

        Ok(Self {
            consumer: Arc::new(consumer),
            topic: topic.to_string(),
        })
    }

    /// Next message, or None once shutdown is requested.
    async fn next_message(&self, shutdown: &mut watch::Receiver<bool>) -> Option<InboundMessage> {
        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(shutdown) => return None,

                result = self.consumer.recv() => match result {
                    Ok(borrowed) => return Some(InboundMessage::from_borrowed(&borrowed)),
                    Err(e) => {
                        tracing::error!(topic = %self.topic, error = %e, "Kafka consumer error");
                    }
                },
            }
        }
    }

    /// Feed the order pipeline, one worker per partition.
    ///
    /// Returns once shutdown is requested and every worker has finished the
    /// message it was handling, or the grace period runs out.
    pub async fn run_partitioned(
        self,
        pipeline: Arc<ConsumptionPipeline>,
        metrics: Arc<Metrics>,
        buffer: usize,
        mut shutdown: watch::Receiver<bool>,
        grace_period: Duration,
    ) {
        let mut workers: HashMap<i32, PartitionWorker> = HashMap::new();
        tracing::info!(topic = %self.topic, "Order consumption loop started");

        while let Some(message) = self.next_message(&mut shutdown).await {
            let partition = message.position.partition;
            let worker = workers.entry(partition).or_insert_with(|| {
                let (tx, rx) = mpsc::channel(buffer);
                let consumer = self.consumer.clone();
                let handle = tokio::spawn(run_partition_worker(
                    partition,
                    rx,
                    pipeline.clone(),
                    metrics.clone(),
                    move |position| KafkaAck::new(consumer.clone(), position),
                ));
                tracing::info!(partition, "Started partition worker");
                PartitionWorker { tx, handle }
            });

            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => break,

                sent = worker.tx.send(message) => {
                    if sent.is_err() {
                        tracing::error!(partition, "Partition worker stopped unexpectedly");
                    }
                }
            }
        }

        tracing::info!(workers = workers.len(), "Stopping partition workers");

        let handles: Vec<_> = workers
            .into_values()
            .map(|worker| {
                drop(worker.tx);
                worker.handle
            })
            .collect();

        if tokio::time::timeout(grace_period, join_all(handles)).await.is_err() {
            tracing::warn!(
                grace_ms = grace_period.as_millis() as u64,
                "Grace period elapsed before all partition workers finished"
            );
        }

        tracing::info!(topic = %self.topic, "Order consumption loop stopped");
    }

    /// Passive dead-letter listener: log every record and acknowledge it.
    pub async fn run_dead_letter_listener(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(topic = %self.topic, "DLQ listener started");

        while let Some(message) = self.next_message(&mut shutdown).await {
            match message.decode::<DeadLetterRecord>() {
                Ok(record) => log_dead_letter(&record, &message.position),
                Err(e) => tracing::error!(
                    position = %message.position,
                    error = %e,
                    "DLQ message received with unreadable payload"
                ),
            }

            KafkaAck::new(self.consumer.clone(), message.position).acknowledge();
        }

        tracing::info!(topic = %self.topic, "DLQ listener stopped");
    }
}

/// Handle one partition's messages in order. `ack_for` builds the
/// acknowledgement handle for a message position.
async fn run_partition_worker<A, F>(
    partition: i32,
    mut rx: mpsc::Receiver<InboundMessage>,
    pipeline: Arc<ConsumptionPipeline>,
    metrics: Arc<Metrics>,
    ack_for: F,
) where
    A: Acknowledge,
    F: Fn(SourcePosition) -> A,
{
    while let Some(message) = rx.recv().await {
        if pipeline.is_shutting_down() {
            tracing::info!(
                partition,
                position = %message.position,
                "Shutting down, leaving queued messages for redelivery"
            );
            break;
        }

        let ack = ack_for(message.position.clone());

        match message.decode::<Order>() {
            Ok(order) => {
                pipeline.handle(order, message.position, ack).await;
            }
            Err(e) => {
                // Can never succeed; commit past it
                metrics.undecodable_messages.inc();
                tracing::error!(
                    position = %message.position,
                    key = ?message.key,
                    error = %e,
                    "Skipping message with undecodable order payload"
                );
                ack.acknowledge();
            }
        }
    }

    tracing::debug!(partition, "Partition worker stopped");
}
