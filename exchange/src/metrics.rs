//! Metrics collection module for the exchange engine
//!
//! Collectors live in a process-wide Prometheus registry and are exposed by the
//! server's metrics endpoint.

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Instant;

lazy_static! {
    /// Global Prometheus registry instance
    pub static ref REGISTRY_INSTANCE: Registry = Registry::new();

    /// Counter for tracking request counts by operation
    pub static ref REQ_COUNTER_VEC: CounterVec =
        CounterVec::new(Opts::new("request_counter", "request counter"), &["method"]).unwrap();

    /// Counter for failed requests by operation
    pub static ref REQ_ERROR_COUNTER_VEC: CounterVec =
        CounterVec::new(Opts::new("request_error_counter", "request error counter"), &["method"]).unwrap();

    /// Histogram for tracking operation execution times
    pub static ref METHOD_HISTOGRAM_VEC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("method_cost", "method cost"),
        &["method"]
    )
    .unwrap();

    /// Executed trades by symbol
    pub static ref TRADE_COUNTER_VEC: CounterVec =
        CounterVec::new(Opts::new("trade_counter", "executed trades"), &["symbol"]).unwrap();

    /// Match attempts by outcome
    pub static ref MATCH_OUTCOME_VEC: CounterVec =
        CounterVec::new(Opts::new("match_outcome", "match attempt outcomes"), &["outcome"]).unwrap();
}

/// Registers all metric collectors with the global registry
pub fn init_registry() {
    let _ = REGISTRY_INSTANCE.register(Box::new(REQ_COUNTER_VEC.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(REQ_ERROR_COUNTER_VEC.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(METHOD_HISTOGRAM_VEC.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(TRADE_COUNTER_VEC.clone()));
    let _ = REGISTRY_INSTANCE.register(Box::new(MATCH_OUTCOME_VEC.clone()));
}

/// Records metrics for an engine operation
///
/// Increments the request counter, runs `handler`, then records its
/// execution time and whether it failed.
pub fn record_metrics<F, T, E>(method_name: &'static str, handler: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    REQ_COUNTER_VEC.with_label_values(&[method_name]).inc();
    let result = handler();

    let elapsed = start.elapsed();
    METHOD_HISTOGRAM_VEC
        .with_label_values(&[method_name])
        .observe(elapsed.as_secs_f64());
    if result.is_err() {
        REQ_ERROR_COUNTER_VEC.with_label_values(&[method_name]).inc();
    }

    result
}
