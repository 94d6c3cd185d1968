// ============================================================================
// Order Pipeline
// ============================================================================
//
// The consuming side of the service:
// - processor   - single-order business logic with injectable failures
// - consumer    - per-message retry loop, aggregation, dead-lettering, ack
// - aggregator  - lock-free running statistics over processed orders
// - dead_letter - fire-and-forget hand-off of exhausted orders
//
// Transport concerns (Kafka offsets, partitions, commits) live in
// crate::messaging; this module only sees Orders, positions and ack handles.
//
// ============================================================================

mod aggregator;
mod consumer;
mod dead_letter;
mod errors;
mod processor;

pub use aggregator::OrderAggregator;
pub use consumer::{Acknowledge, ConsumptionPipeline};
pub use dead_letter::{log_dead_letter, DeadLetterPublisher, DeadLetterSink};
pub use errors::{DeadLetterError, PublishError};
pub use processor::{random_failures, OrderProcessor};

#[cfg(test)]
pub(crate) use dead_letter::testing;
