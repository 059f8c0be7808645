//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_operations_total` - Deposits/withdrawals committed
//! - `ledger_operation_duration_seconds` - Histogram of operation latencies
//! - `ledger_interest_accruals_total` - Daily accrual entries appended
//! - `ledger_interest_credited_total` - Sum of monthly interest credited
//! - `ledger_batch_errors_total` - Per-account batch step failures
//! - `ledger_accounts` - Current number of accounts

use prometheus::{Counter, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Metrics collector
///
/// Each collector owns its registry, so multiple ledger instances in one
/// process do not collide on metric names.
#[derive(Clone)]
pub struct Metrics {
    /// Total operations committed
    pub operations_total: IntCounter,

    /// Operation latency histogram
    pub operation_duration: Histogram,

    /// Total daily accrual entries appended
    pub accruals_total: IntCounter,

    /// Total monthly interest credited (currency units)
    pub interest_credited_total: Counter,

    /// Total per-account batch failures
    pub batch_errors_total: IntCounter,

    /// Current account count
    pub accounts: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounter::new(
            "ledger_operations_total",
            "Deposits and withdrawals committed",
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let accruals_total = IntCounter::new(
            "ledger_interest_accruals_total",
            "Daily accrual entries appended",
        )?;
        registry.register(Box::new(accruals_total.clone()))?;

        let interest_credited_total = Counter::new(
            "ledger_interest_credited_total",
            "Sum of monthly interest credited",
        )?;
        registry.register(Box::new(interest_credited_total.clone()))?;

        let batch_errors_total = IntCounter::new(
            "ledger_batch_errors_total",
            "Per-account batch step failures",
        )?;
        registry.register(Box::new(batch_errors_total.clone()))?;

        let accounts = IntGauge::new("ledger_accounts", "Current number of accounts")?;
        registry.register(Box::new(accounts.clone()))?;

        Ok(Self {
            operations_total,
            operation_duration,
            accruals_total,
            interest_credited_total,
            batch_errors_total,
            accounts,
            registry,
        })
    }

    /// Record a committed operation with its latency
    pub fn record_operation(&self, duration_seconds: f64) {
        self.operations_total.inc();
        self.operation_duration.observe(duration_seconds);
    }

    /// Record a daily accrual entry
    pub fn record_accrual(&self) {
        self.accruals_total.inc();
    }

    /// Record a monthly interest credit
    pub fn record_credit(&self, amount: Decimal) {
        self.interest_credited_total
            .inc_by(amount.to_f64().unwrap_or(0.0));
    }

    /// Record a per-account batch failure
    pub fn record_batch_error(&self) {
        self.batch_errors_total.inc();
    }

    /// Update the account count gauge
    pub fn set_accounts(&self, count: i64) {
        self.accounts.set(count);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.operations_total.get(), 0);
        assert_eq!(metrics.accruals_total.get(), 0);
    }

    #[test]
    fn test_record_operation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation(0.002);
        metrics.record_operation(0.004);
        assert_eq!(metrics.operations_total.get(), 2);
    }

    #[test]
    fn test_record_credit_accumulates() {
        let metrics = Metrics::new().unwrap();
        metrics.record_credit(Decimal::new(411, 2));
        metrics.record_credit(Decimal::new(100, 2));
        assert!((metrics.interest_credited_total.get() - 5.11).abs() < 1e-9);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors in one process must not collide
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_accrual();
        assert_eq!(a.accruals_total.get(), 1);
        assert_eq!(b.accruals_total.get(), 0);
    }
}
