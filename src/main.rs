use actix_web::web;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod messaging;
mod metrics;
mod models;
mod pipeline;
mod producer;
mod utils;

use api::ApiState;
use config::AppConfig;
use messaging::{OrderStreamConsumer, RedpandaClient};
use pipeline::{random_failures, ConsumptionPipeline, DeadLetterSink, OrderAggregator, OrderProcessor};
use producer::{OrderProducer, SequentialOrderIds, TimestampOrderIds};

const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, override with RUST_LOG
    // Example: RUST_LOG=order_pipeline=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_pipeline=debug")),
        )
        .init();

    tracing::info!("Starting order pipeline");

    // === 1. Configuration ===
    let config = AppConfig::load()?;
    tracing::info!(
        brokers = %config.kafka.brokers,
        orders_topic = %config.kafka.orders_topic,
        dead_letter_topic = %config.kafka.dead_letter_topic,
        max_retries = config.retry.max_retries,
        failure_rate = config.processing.failure_injection_rate,
        "Configuration loaded"
    );

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Kafka clients ===
    let redpanda = Arc::new(RedpandaClient::new(&config.kafka)?);
    let orders_consumer = OrderStreamConsumer::new(
        &config.kafka,
        &config.kafka.orders_topic,
        &config.kafka.consumer_group,
    )?;
    let dead_letter_consumer = OrderStreamConsumer::new(
        &config.kafka,
        &config.kafka.dead_letter_topic,
        &config.kafka.dead_letter_group,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let grace_period = config.shutdown.grace_period();

    // === 4. Consumption pipeline ===
    let aggregator = Arc::new(OrderAggregator::new(config.aggregation.log_interval));
    let (dead_letters, dispatcher) = DeadLetterSink::spawn(redpanda.clone(), metrics.clone());

    let pipeline = Arc::new(ConsumptionPipeline::new(
        OrderProcessor::new(
            Duration::from_millis(config.processing.processing_delay_ms),
            random_failures(config.processing.failure_injection_rate),
        ),
        config.retry.policy(),
        aggregator.clone(),
        dead_letters,
        metrics.clone(),
        shutdown_rx.clone(),
    ));

    let consumer_task = tokio::spawn(orders_consumer.run_partitioned(
        pipeline,
        metrics.clone(),
        config.kafka.partition_buffer,
        shutdown_rx.clone(),
        grace_period,
    ));
    let dead_letter_task = tokio::spawn(dead_letter_consumer.run_dead_letter_listener(shutdown_rx.clone()));

    // === 5. Scheduled producer ===
    let producer_task = tokio::spawn(
        OrderProducer::new(
            redpanda.clone(),
            Arc::new(SequentialOrderIds::starting_at(config.producer.first_order_id)),
            metrics.clone(),
            config.producer.clone(),
        )
        .run(shutdown_rx),
    );

    // === 6. HTTP API (runs until SIGINT/SIGTERM) ===
    let state = web::Data::new(ApiState {
        aggregator: aggregator.clone(),
        publisher: redpanda,
        random_ids: Arc::new(TimestampOrderIds),
        metrics: metrics.clone(),
    });

    if let Err(e) = api::start_http_server(&config.server, state, metrics)?.await {
        tracing::error!(error = %e, "HTTP server error");
    }

    // === 7. Graceful shutdown ===
    tracing::info!("Shutdown requested, stopping consumers and producer");
    shutdown_tx.send_replace(true);

    await_task("order consumer", consumer_task, grace_period + Duration::from_secs(1)).await;
    await_task("DLQ listener", dead_letter_task, grace_period).await;
    await_task("order producer", producer_task, grace_period).await;
    await_task("DLQ dispatcher", dispatcher, DISPATCHER_DRAIN_TIMEOUT).await;

    aggregator.log_summary();
    tracing::info!("Order pipeline stopped");

    Ok(())
}

async fn await_task<T>(name: &str, task: JoinHandle<T>, limit: Duration) {
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(_)) => tracing::debug!(task = name, "Task finished"),
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task panicked"),
        Err(_) => tracing::warn!(task = name, "Task did not finish in time"),
    }
}
