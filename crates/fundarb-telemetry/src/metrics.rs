//! Prometheus metrics for signing and exchange traffic.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means a duplicate metric
//! name, which is a programming error caught on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Actions signed successfully.
/// Labels: kind (order/updateLeverage/approveAgent)
pub static ACTIONS_SIGNED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fundarb_actions_signed_total",
        "Total actions signed",
        &["kind"]
    )
    .unwrap()
});

/// Signing attempts that returned an error.
pub static SIGNING_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fundarb_signing_failures_total",
        "Total failed signing attempts",
        &["kind"]
    )
    .unwrap()
});

/// Exchange HTTP requests.
/// Labels: endpoint (exchange/info), outcome (ok/rejected/error)
pub static EXCHANGE_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fundarb_exchange_requests_total",
        "Total requests sent to the exchange API",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// Exchange round-trip latency in milliseconds.
pub static EXCHANGE_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fundarb_exchange_latency_ms",
        "Exchange API round-trip latency in milliseconds",
        &["endpoint"],
        vec![25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn action_signed(kind: &str) {
        ACTIONS_SIGNED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn signing_failed(kind: &str) {
        SIGNING_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn exchange_request(endpoint: &str, outcome: &str) {
        EXCHANGE_REQUESTS_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    pub fn exchange_latency(endpoint: &str, latency_ms: f64) {
        EXCHANGE_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
    }

    /// Default registry in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
