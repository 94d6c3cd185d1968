use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Order;
use super::errors::ProcessingError;

// ============================================================================
// Order Processor - single-order business logic
// ============================================================================
//
// Validates the order, asks the failure decision whether this attempt should
// fail (models a flaky downstream dependency), then waits out the simulated
// processing latency. Does not touch the aggregator or the dead-letter sink.
//
// ============================================================================

/// Decides whether a given attempt (1-based) of an order fails transiently.
pub type FailureDecision = Arc<dyn Fn(&Order, u32) -> bool + Send + Sync>;

pub const TRANSIENT_FAILURE_MESSAGE: &str = "Temporary processing failure";

/// Fails each attempt independently with probability `rate`.
pub fn random_failures(rate: f64) -> FailureDecision {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    if rate == 0.0 {
        return never_fail();
    }
    if rate == 1.0 {
        return always_fail();
    }
    Arc::new(move |_order: &Order, _attempt: u32| rand::rng().random_bool(rate))
}

pub fn never_fail() -> FailureDecision {
    Arc::new(|_order: &Order, _attempt: u32| false)
}

pub fn always_fail() -> FailureDecision {
    Arc::new(|_order: &Order, _attempt: u32| true)
}

/// Fails the first `failures` attempts of every order, then succeeds.
#[cfg(test)]
pub fn fail_first_attempts(failures: u32) -> FailureDecision {
    Arc::new(move |_order: &Order, attempt: u32| attempt <= failures)
}

#[derive(Clone)]
pub struct OrderProcessor {
    processing_delay: Duration,
    decide_failure: FailureDecision,
}

impl OrderProcessor {
    pub fn new(processing_delay: Duration, decide_failure: FailureDecision) -> Self {
        Self {
            processing_delay,
            decide_failure,
        }
    }

    pub async fn process(&self, order: &Order, attempt: u32) -> Result<(), ProcessingError> {
        order.validate().map_err(ProcessingError::Invalid)?;

        if (self.decide_failure)(order, attempt) {
            return Err(ProcessingError::Transient(TRANSIENT_FAILURE_MESSAGE.to_string()));
        }

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        tracing::debug!(order_id = %order.order_id, "Order processed successfully");
        Ok(())
    }
}
