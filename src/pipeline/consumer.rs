use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::metrics::Metrics;
use crate::models::{DeadLetterRecord, Order, SourcePosition};
use crate::utils::{retry_on_transient, RetryPolicy, RetryResult};
use super::aggregator::OrderAggregator;
use super::dead_letter::DeadLetterSink;
use super::processor::OrderProcessor;

// ============================================================================
// Consumption Pipeline - per-message retry loop
// ============================================================================
//
//   Attempting(n) --ok--> Succeeded   : aggregate, ack
//   Attempting(n) --err-> should_retry? sleep backoff(n), Attempting(n+1)
//                                  else Exhausted : dead-letter, ack
//
// Invalid orders skip straight to Exhausted. Shutdown during a backoff sleep
// is treated as exhaustion. The acknowledgement is consumed exactly once,
// after a terminal state is reached, and never waits on the dead-letter
// publish.
//
// ============================================================================

/// Commits a message's source position. Consumed on use, so it can only
/// ever be acknowledged once.
pub trait Acknowledge: Send {
    fn acknowledge(self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { attempts: u32 },
    DeadLettered { attempts: u32, reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "succeeded",
            Outcome::DeadLettered { .. } => "dead_lettered",
        }
    }
}

pub struct ConsumptionPipeline {
    processor: OrderProcessor,
    policy: RetryPolicy,
    aggregator: Arc<OrderAggregator>,
    dead_letters: DeadLetterSink,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
}

impl ConsumptionPipeline {
    pub fn new(
        processor: OrderProcessor,
        policy: RetryPolicy,
        aggregator: Arc<OrderAggregator>,
        dead_letters: DeadLetterSink,
        metrics: Arc<Metrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processor,
            policy,
            aggregator,
            dead_letters,
            metrics,
            shutdown,
        }
    }

    pub fn aggregator(&self) -> &Arc<OrderAggregator> {
        &self.aggregator
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Drive one message to a terminal state, then acknowledge it.
    pub async fn handle<A: Acknowledge>(&self, order: Order, position: SourcePosition, ack: A) -> Outcome {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut shutdown = self.shutdown.clone();

        let processor = &self.processor;
        let metrics = &self.metrics;
        let order_ref = &order;

        let result = retry_on_transient(&self.policy, &mut shutdown, move |attempt| {
            tracing::info!(
                order_id = %order_ref.order_id,
                product = %order_ref.product,
                price = %format!("{:.2}", order_ref.price),
                attempt = attempt,
                max_attempts = max_attempts,
                "Processing order"
            );
            metrics.record_attempt(attempt);
            processor.process(order_ref, attempt)
        })
        .await;

        let outcome = match result {
            RetryResult::Success { attempts, .. } => {
                self.aggregator.add_order(&order);
                tracing::info!(
                    order_id = %order.order_id,
                    attempts = attempts,
                    "Successfully processed order"
                );
                Outcome::Succeeded { attempts }
            }
            RetryResult::Exhausted { error, attempts }
            | RetryResult::PermanentFailure { error, attempts }
            | RetryResult::Interrupted { error, attempts } => {
                let reason = error.to_string();
                tracing::error!(
                    order_id = %order.order_id,
                    attempts = attempts,
                    reason = %reason,
                    position = %position,
                    "Order processing exhausted, routing to DLQ"
                );

                let record = DeadLetterRecord::new(order, reason.clone(), position.clone(), attempts);
                if let Err(e) = self.dead_letters.send(record) {
                    tracing::error!(error = %e, "Critical error sending to DLQ");
                }
                Outcome::DeadLettered { attempts, reason }
            }
        };

        ack.acknowledge();
        tracing::debug!(position = %position, outcome = outcome.label(), "Acknowledged message");

        self.metrics
            .record_outcome(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }
}
