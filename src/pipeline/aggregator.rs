use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{Order, OrderStats};

// ============================================================================
// Order Aggregator - running statistics over processed orders
// ============================================================================
//
// Two independent atomic counters, no lock:
// - total_orders
// - total_revenue_minor (price in minor units, rounded half-up per order)
//
// Each counter is monotonic between resets; revenue saturates at u64::MAX.
// A snapshot may pair a count with a revenue value that already includes
// (or still misses) an in-flight add; the figures are for reporting only.
// reset() racing with add_order() may interleave arbitrarily.
//
// ============================================================================

pub const DEFAULT_LOG_INTERVAL: u64 = 10;

pub struct OrderAggregator {
    total_orders: AtomicU64,
    total_revenue_minor: AtomicU64,
    log_interval: u64,
}

impl OrderAggregator {
    pub fn new(log_interval: u64) -> Self {
        Self {
            total_orders: AtomicU64::new(0),
            total_revenue_minor: AtomicU64::new(0),
            log_interval: log_interval.max(1),
        }
    }

    /// Count one successfully processed order.
    pub fn add_order(&self, order: &Order) {
        let units = order.price_minor_units();
        // Saturate rather than wrap: the total must never move backwards
        let _ = self.total_revenue_minor.fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| {
            Some(total.saturating_add(units))
        });
        let count = self.total_orders.fetch_add(1, Ordering::AcqRel) + 1;

        if count % self.log_interval == 0 {
            self.log_summary();
        }
    }

    pub fn total_orders(&self) -> u64 {
        self.total_orders.load(Ordering::Acquire)
    }

    pub fn total_revenue_minor(&self) -> u64 {
        self.total_revenue_minor.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> OrderStats {
        let total_orders = self.total_orders();
        let total_revenue_minor = self.total_revenue_minor();

        let running_average = if total_orders == 0 {
            0.0
        } else {
            total_revenue_minor as f64 / (total_orders as f64 * 100.0)
        };

        OrderStats {
            total_orders,
            running_average,
            total_revenue: total_revenue_minor as f64 / 100.0,
        }
    }

    pub fn reset(&self) {
        self.total_orders.store(0, Ordering::Release);
        self.total_revenue_minor.store(0, Ordering::Release);
        tracing::info!("Aggregation statistics reset");
    }

    /// Emits the periodic summary. Logging only; never fails the caller.
    pub fn log_summary(&self) {
        let stats = self.snapshot();
        let rule = "=".repeat(70);

        tracing::info!("{}", rule);
        tracing::info!("AGGREGATION STATS:");
        tracing::info!("  Total Orders Processed: {}", stats.total_orders);
        tracing::info!("  Running Average Price: ${:.2}", stats.running_average);
        tracing::info!("  Total Revenue: ${:.2}", stats.total_revenue);
        tracing::info!("{}", rule);
    }
}

impl Default for OrderAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn order(price: f64) -> Order {
        Order::new("1001", "Item1", price)
    }

    #[test]
    fn test_empty_aggregator_reports_zero() {
        let aggregator = OrderAggregator::default();
        let stats = aggregator.snapshot();

        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.running_average, 0.0);
        assert_eq!(stats.total_revenue, 0.0);
    }

    #[test]
    fn test_running_average_and_revenue() {
        let aggregator = OrderAggregator::default();
        for price in [10.00, 20.00, 30.00] {
            aggregator.add_order(&order(price));
        }

        let stats = aggregator.snapshot();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, 60.00);
        assert_eq!(stats.running_average, 20.00);
    }

    #[test]
    fn test_reset_then_add() {
        let aggregator = OrderAggregator::default();
        aggregator.add_order(&order(99.99));
        aggregator.add_order(&order(1.01));

        aggregator.reset();
        aggregator.add_order(&order(5.00));

        let stats = aggregator.snapshot();
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.total_revenue, 5.00);
        assert_eq!(stats.running_average, 5.00);
    }

    #[test]
    fn test_fractional_cents_round_per_order() {
        let aggregator = OrderAggregator::default();
        aggregator.add_order(&order(0.125));
        aggregator.add_order(&order(0.125));

        assert_eq!(aggregator.total_revenue_minor(), 26);
    }

    #[test]
    fn test_summary_interval_does_not_disturb_counts() {
        let aggregator = OrderAggregator::new(2);
        for _ in 0..5 {
            aggregator.add_order(&order(1.00));
        }

        assert_eq!(aggregator.total_orders(), 5);
        assert_eq!(aggregator.total_revenue_minor(), 500);
    }

    #[test]
    fn test_concurrent_adds_lose_no_updates() {
        let aggregator = Arc::new(OrderAggregator::default());
        let threads = 16;
        let per_thread = 1_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        aggregator.add_order(&order(2.50));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (threads * per_thread) as u64;
        assert_eq!(aggregator.total_orders(), expected);
        assert_eq!(aggregator.total_revenue_minor(), expected * 250);
        assert_eq!(aggregator.snapshot().running_average, 2.50);
    }

    #[test]
    fn test_revenue_saturates_instead_of_wrapping() {
        let aggregator = OrderAggregator::default();
        let huge = order(1.0e17);

        aggregator.add_order(&huge);
        let before = aggregator.total_revenue_minor();
        aggregator.add_order(&huge);
        let after = aggregator.total_revenue_minor();

        assert!(after >= before);
        assert_eq!(after, u64::MAX);
        assert_eq!(aggregator.total_orders(), 2);
    }
}
