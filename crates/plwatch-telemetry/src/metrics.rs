//! Prometheus metrics for plwatch.
//!
//! Every series is labelled by `context` so several monitored pages can
//! share one process.
//!
//! # Panics
//!
//! Registration uses `unwrap()`: a failure means duplicate metric names,
//! which is a programming error surfaced on first use.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::TelemetryResult;

/// Ticks by outcome.
/// Labels: outcome (ok/source_unavailable/empty_selection)
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "plwatch_ticks_total",
        "Total scheduler ticks by outcome",
        &["context", "outcome"]
    )
    .unwrap()
});

/// Tick processing time in milliseconds.
pub static TICK_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "plwatch_tick_duration_ms",
        "Tick processing time in milliseconds",
        &["context"],
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0]
    )
    .unwrap()
});

/// Last computed total.
pub static PNL: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("plwatch_pnl", "Last computed P/L total", &["context"]).unwrap()
});

/// Current classification (1=profit, 0=loss).
pub static IN_PROFIT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "plwatch_in_profit",
        "Current classification (1=profit, 0=loss)",
        &["context"]
    )
    .unwrap()
});

/// Alerts by disposition.
/// Labels: disposition (delivered/suppressed/failed)
pub static ALERTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "plwatch_alerts_total",
        "Total loss-to-profit alerts by disposition",
        &["context", "disposition"]
    )
    .unwrap()
});

/// Value source failures.
pub static SOURCE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "plwatch_source_failures_total",
        "Total value source failures",
        &["context"]
    )
    .unwrap()
});

/// Persisted vs discovered count mismatch (1=mismatch).
pub static COUNT_MISMATCH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "plwatch_count_mismatch",
        "Persisted position count differs from discovered count (1=mismatch)",
        &["context"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a tick outcome.
    pub fn tick(context: &str, outcome: &str) {
        TICKS_TOTAL.with_label_values(&[context, outcome]).inc();
    }

    pub fn tick_duration(context: &str, duration_ms: f64) {
        TICK_DURATION_MS
            .with_label_values(&[context])
            .observe(duration_ms);
    }

    /// Record the latest total and its classification.
    pub fn pnl(context: &str, total: f64, in_profit: bool) {
        PNL.with_label_values(&[context]).set(total);
        IN_PROFIT
            .with_label_values(&[context])
            .set(if in_profit { 1.0 } else { 0.0 });
    }

    pub fn alert(context: &str, disposition: &str) {
        ALERTS_TOTAL
            .with_label_values(&[context, disposition])
            .inc();
    }

    pub fn source_failure(context: &str) {
        SOURCE_FAILURES_TOTAL.with_label_values(&[context]).inc();
    }

    pub fn count_mismatch(context: &str, mismatched: bool) {
        COUNT_MISMATCH
            .with_label_values(&[context])
            .set(if mismatched { 1.0 } else { 0.0 });
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
