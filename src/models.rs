use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ============================================================================
// Domain Models
// ============================================================================

/// Largest price an order may carry. Keeps the revenue total, kept in minor
/// units, far below `u64::MAX`.
pub const MAX_ORDER_PRICE: f64 = 1_000_000_000.0;

/// An order event as it travels through the orders topic.
///
/// Orders are immutable once created; the pipeline only ever reads them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub product: String,
    pub price: f64,
}

impl Order {
    pub fn new(order_id: impl Into<String>, product: impl Into<String>, price: f64) -> Self {
        Self {
            order_id: order_id.into(),
            product: product.into(),
            price,
        }
    }

    /// Structural checks every order must pass before it is processed.
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id.trim().is_empty() {
            return Err("order id is empty".to_string());
        }
        if self.product.trim().is_empty() {
            return Err("product is empty".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative amount, got {}", self.price));
        }
        if self.price > MAX_ORDER_PRICE {
            return Err(format!("price must not exceed {}, got {}", MAX_ORDER_PRICE, self.price));
        }
        Ok(())
    }

    /// Price in minor currency units, rounded half-up per order.
    pub fn price_minor_units(&self) -> u64 {
        (self.price * 100.0).round() as u64
    }
}

/// Where a message sits in its source stream.
///
/// Treated as an opaque token by the pipeline; only the transport layer
/// interprets the fields.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl SourcePosition {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

// ============================================================================
// Dead Letter Record
// ============================================================================

/// An order that exhausted its processing attempts, plus failure context.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub id: Uuid,
    pub order: Order,
    pub failure_reason: String,
    pub original_position: SourcePosition,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(
        order: Order,
        failure_reason: impl Into<String>,
        original_position: SourcePosition,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            failure_reason: failure_reason.into(),
            original_position,
            attempts,
            failed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Aggregation Snapshot
// ============================================================================

/// Point-in-time view of the running aggregation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: u64,
    pub running_average: f64,
    pub total_revenue: f64,
}
