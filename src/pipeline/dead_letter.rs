use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::Metrics;
use crate::models::{DeadLetterRecord, SourcePosition};
use super::errors::DeadLetterError;

// ============================================================================
// Dead Letter Sink
// ============================================================================
//
// Orders that exhaust their attempts are handed to the sink, which enqueues
// them for a background dispatcher and returns immediately. The dispatcher
// publishes each record to the dead-letter channel and reports the outcome
// through logs and metrics only:
// - a publish failure is logged as critical and NOT retried
// - the consuming pipeline never waits on the publish result
//
// The dispatcher stops once every sink handle is dropped and the queue is
// drained, which is what shutdown relies on.
//
// ============================================================================

/// Destination for dead-lettered orders (a Kafka topic in production)
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    /// Publish a record and return where it landed in the dead-letter channel
    async fn publish(&self, record: &DeadLetterRecord) -> Result<SourcePosition, DeadLetterError>;
}

#[derive(Clone)]
pub struct DeadLetterSink {
    tx: mpsc::UnboundedSender<DeadLetterRecord>,
}

impl DeadLetterSink {
    /// Start the dispatcher task and return the sink feeding it.
    pub fn spawn(
        publisher: Arc<dyn DeadLetterPublisher>,
        metrics: Arc<Metrics>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_dispatcher(rx, publisher, metrics));

        tracing::info!("Dead letter dispatcher started");
        (Self { tx }, handle)
    }

    /// Hand a record over for publishing. Never blocks.
    ///
    /// Only queueing can fail here. The delivery position comes from
    /// [`DeadLetterPublisher::publish`], which the dispatcher reports through
    /// logs and metrics.
    pub fn send(&self, record: DeadLetterRecord) -> Result<(), DeadLetterError> {
        tracing::debug!(
            order_id = %record.order.order_id,
            reason = %record.failure_reason,
            attempts = record.attempts,
            position = %record.original_position,
            "Queueing order for DLQ"
        );

        self.tx.send(record).map_err(|_| DeadLetterError::ChannelClosed)
    }
}

async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<DeadLetterRecord>,
    publisher: Arc<dyn DeadLetterPublisher>,
    metrics: Arc<Metrics>,
) {
    while let Some(record) = rx.recv().await {
        match publisher.publish(&record).await {
            Ok(position) => {
                metrics.record_dead_letter(&record.order.product);
                tracing::info!(
                    order_id = %record.order.order_id,
                    dlq_position = %position,
                    "Order sent to DLQ"
                );
            }
            Err(e) => {
                metrics.dead_letter_publish_failures.inc();
                tracing::error!(
                    order_id = %record.order.order_id,
                    error = %e,
                    "Failed to send order to DLQ"
                );
            }
        }
    }

    tracing::info!("Dead letter dispatcher drained and stopped");
}

/// Passive dead-letter listener: log the record, nothing else.
pub fn log_dead_letter(record: &DeadLetterRecord, position: &SourcePosition) {
    tracing::error!(
        order_id = %record.order.order_id,
        product = %record.order.product,
        price = %format!("{:.2}", record.order.price),
        reason = %record.failure_reason,
        attempts = record.attempts,
        original_position = %record.original_position,
        dlq_position = %position,
        "DLQ message received"
    );
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory publisher that records everything it is asked to publish.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub records: Mutex<Vec<DeadLetterRecord>>,
        pub fail: bool,
    }

    impl RecordingPublisher {
        pub fn failing() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn records(&self) -> Vec<DeadLetterRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeadLetterPublisher for RecordingPublisher {
        async fn publish(&self, record: &DeadLetterRecord) -> Result<SourcePosition, DeadLetterError> {
            if self.fail {
                return Err(DeadLetterError::Publish("broker unavailable".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            records.push(record.clone());
            Ok(SourcePosition::new("orders-dlq", 0, records.len() as i64 - 1))
        }
    }
}
