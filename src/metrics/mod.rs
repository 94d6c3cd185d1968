// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

// Re-export for public API
pub use server::metrics_handler;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers the consuming side of the service:
// - processing attempts and their retry number
// - terminal outcomes per message (succeeded / dead_lettered) and latency
// - dead-letter publishing results
// - messages that could not be decoded at all
//
// Exposed in text format at GET /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Processing Metrics
    pub processing_attempts: IntCounterVec,
    pub orders_completed: IntCounterVec,
    pub processing_duration: HistogramVec,
    pub undecodable_messages: IntCounter,

    // DLQ Metrics
    pub dead_letters_total: IntCounter,
    pub dead_letters_by_product: IntCounterVec,
    pub dead_letter_publish_failures: IntCounter,

    // Submission Metrics
    pub orders_published: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let processing_attempts = IntCounterVec::new(
            Opts::new("order_processing_attempts_total", "Processing attempts by attempt number"),
            &["attempt"],
        )?;
        registry.register(Box::new(processing_attempts.clone()))?;

        let orders_completed = IntCounterVec::new(
            Opts::new("orders_completed_total", "Messages that reached a terminal state"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_completed.clone()))?;

        let processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_processing_duration_seconds",
                "Time from first attempt to acknowledgement, backoff included",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(processing_duration.clone()))?;

        let undecodable_messages = IntCounter::new(
            "undecodable_messages_total",
            "Messages skipped because the payload was not a valid order",
        )?;
        registry.register(Box::new(undecodable_messages.clone()))?;

        let dead_letters_total = IntCounter::new(
            "dlq_messages_total",
            "Total orders published to the dead letter topic",
        )?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        let dead_letters_by_product = IntCounterVec::new(
            Opts::new("dlq_messages_by_product", "Dead-lettered orders by product"),
            &["product"],
        )?;
        registry.register(Box::new(dead_letters_by_product.clone()))?;

        let dead_letter_publish_failures = IntCounter::new(
            "dlq_publish_failures_total",
            "Dead letter records that could not be published",
        )?;
        registry.register(Box::new(dead_letter_publish_failures.clone()))?;

        let orders_published = IntCounterVec::new(
            Opts::new("orders_published_total", "Orders handed to the orders topic"),
            &["source", "result"],
        )?;
        registry.register(Box::new(orders_published.clone()))?;

        Ok(Self {
            registry,
            processing_attempts,
            orders_completed,
            processing_duration,
            undecodable_messages,
            dead_letters_total,
            dead_letters_by_product,
            dead_letter_publish_failures,
            orders_published,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_attempt(&self, attempt: u32) {
        self.processing_attempts
            .with_label_values(&[attempt.to_string().as_str()])
            .inc();
    }

    pub fn record_outcome(&self, outcome: &str, duration_secs: f64) {
        self.orders_completed.with_label_values(&[outcome]).inc();
        self.processing_duration
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    pub fn record_dead_letter(&self, product: &str) {
        self.dead_letters_total.inc();
        self.dead_letters_by_product.with_label_values(&[product]).inc();
    }

    pub fn record_publish(&self, source: &str, success: bool) {
        let result = if success { "ok" } else { "error" };
        self.orders_published.with_label_values(&[source, result]).inc();
    }
}
