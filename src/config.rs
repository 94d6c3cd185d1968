use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::utils::RetryPolicy;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Load order (later sources override earlier ones):
// 1. built-in defaults
// 2. config/order-pipeline.toml (optional, CONFIG_FILE overrides the path)
// 3. ORDER_PIPELINE__<SECTION>__<KEY> environment variables
//
// ============================================================================

const ENV_PREFIX: &str = "ORDER_PIPELINE";
const DEFAULT_CONFIG_FILE: &str = "config/order-pipeline";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kafka: KafkaConfig,
    pub retry: RetryConfig,
    pub processing: ProcessingConfig,
    pub aggregation: AggregationConfig,
    pub producer: ProducerConfig,
    pub server: ServerConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub orders_topic: String,
    pub dead_letter_topic: String,
    pub consumer_group: String,
    pub dead_letter_group: String,
    pub auto_offset_reset: String,
    /// Messages buffered per partition worker before the fetch loop waits
    pub partition_buffer: usize,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            orders_topic: "orders".to_string(),
            dead_letter_topic: "orders-dlq".to_string(),
            consumer_group: "order-consumer-group".to_string(),
            dead_letter_group: "dlq-consumer-group".to_string(),
            auto_offset_reset: "earliest".to_string(),
            partition_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub failure_injection_rate: f64,
    pub processing_delay_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            failure_injection_rate: 0.10,
            processing_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub log_interval: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub enabled: bool,
    pub max_orders: u64,
    pub interval_ms: u64,
    pub first_order_id: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_orders: 50,
            interval_ms: 1000,
            first_order_id: 1001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 30_000,
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl AppConfig {
    /// Load from the optional config file and the environment, then validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config: Self = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rate = self.processing.failure_injection_rate;
        if !(0.0..=1.0).contains(&rate) {
            bail!("processing.failure_injection_rate must be within [0, 1], got {}", rate);
        }
        if self.aggregation.log_interval == 0 {
            bail!("aggregation.log_interval must be greater than zero");
        }
        if self.retry.backoff_base_ms == 0 {
            bail!("retry.backoff_base_ms must be greater than zero");
        }
        if self.retry.max_backoff_ms < self.retry.backoff_base_ms {
            bail!("retry.max_backoff_ms must not be below retry.backoff_base_ms");
        }
        if self.kafka.partition_buffer == 0 {
            bail!("kafka.partition_buffer must be greater than zero");
        }
        if self.producer.enabled && self.producer.interval_ms == 0 {
            bail!("producer.interval_ms must be greater than zero");
        }
        Ok(())
    }
}
