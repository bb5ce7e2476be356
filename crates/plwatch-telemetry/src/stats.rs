//! Per-context session statistics, read back from the metrics registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use serde::Serialize;
use tracing::info;

use crate::metrics::{
    ALERTS_TOTAL, IN_PROFIT, PNL, SOURCE_FAILURES_TOTAL, TICKS_TOTAL, TICK_DURATION_MS,
};

/// Session statistics for one context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub context: String,
    pub ticks_ok: u64,
    pub ticks_source_unavailable: u64,
    pub ticks_empty_selection: u64,
    pub source_failures: u64,
    pub alerts_delivered: u64,
    pub alerts_suppressed: u64,
    pub alerts_failed: u64,
    pub last_pnl: f64,
    pub in_profit: bool,
    pub tick_p50_ms: f64,
    pub tick_p95_ms: f64,
}

/// Logs a summary of what each context's scheduler did this session.
pub struct SessionStatsReporter {
    contexts: Vec<String>,
    start_time: DateTime<Utc>,
}

impl SessionStatsReporter {
    pub fn new(contexts: Vec<String>) -> Self {
        Self {
            contexts,
            start_time: Utc::now(),
        }
    }

    pub fn get_stats(&self) -> Vec<ContextStats> {
        self.contexts
            .iter()
            .map(|context| self.get_context_stats(context))
            .collect()
    }

    fn get_context_stats(&self, context: &str) -> ContextStats {
        let ticks = |outcome: &str| counter_value(&TICKS_TOTAL, &[context, outcome]);
        let alerts = |disposition: &str| counter_value(&ALERTS_TOTAL, &[context, disposition]);
        let (tick_p50_ms, tick_p95_ms) = histogram_percentiles(&TICK_DURATION_MS, context);

        ContextStats {
            context: context.to_string(),
            ticks_ok: ticks("ok"),
            ticks_source_unavailable: ticks("source_unavailable"),
            ticks_empty_selection: ticks("empty_selection"),
            source_failures: counter_value(&SOURCE_FAILURES_TOTAL, &[context]),
            alerts_delivered: alerts("delivered"),
            alerts_suppressed: alerts("suppressed"),
            alerts_failed: alerts("failed"),
            last_pnl: PNL.with_label_values(&[context]).get(),
            in_profit: IN_PROFIT.with_label_values(&[context]).get() > 0.0,
            tick_p50_ms,
            tick_p95_ms,
        }
    }

    /// Log the summary for every context.
    pub fn output_summary(&self) {
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== Session Statistics ==========");
        info!(
            "Since: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );

        for s in self.get_stats() {
            info!("--- {} ---", s.context);
            info!(
                "  Ticks: ok={}, source unavailable={}, empty selection={}",
                s.ticks_ok, s.ticks_source_unavailable, s.ticks_empty_selection
            );
            info!(
                "  Alerts: delivered={}, suppressed={}, failed={}",
                s.alerts_delivered, s.alerts_suppressed, s.alerts_failed
            );
            info!(
                "  Last total: {:.2} ({})",
                s.last_pnl,
                if s.in_profit { "profit" } else { "loss" }
            );
            info!(
                "  Tick time (ms): P50={:.2}, P95={:.2}",
                s.tick_p50_ms, s.tick_p95_ms
            );
        }

        info!("========================================");
    }

    pub fn to_json(&self) -> HashMap<String, ContextStats> {
        self.get_stats()
            .into_iter()
            .map(|s| (s.context.clone(), s))
            .collect()
    }
}

fn counter_value(counter: &prometheus::CounterVec, labels: &[&str]) -> u64 {
    counter.with_label_values(labels).get() as u64
}

/// (p50, p95) of the single-label histogram series for `context`.
fn histogram_percentiles(histogram: &prometheus::HistogramVec, context: &str) -> (f64, f64) {
    for mf in histogram.collect() {
        for m in mf.get_metric() {
            let matches = m
                .get_label()
                .first()
                .map(|pair| pair.get_value() == context)
                .unwrap_or(false);
            if !matches {
                continue;
            }

            let h = m.get_histogram();
            let count = h.get_sample_count();
            if count == 0 {
                return (0.0, 0.0);
            }
            let buckets = h.get_bucket();
            return (
                percentile_from_buckets(buckets, count, 0.50),
                percentile_from_buckets(buckets, count, 0.95),
            );
        }
    }
    (0.0, 0.0)
}

/// Linear interpolation inside the bucket holding the target rank.
fn percentile_from_buckets(
    buckets: &[prometheus::proto::Bucket],
    total_count: u64,
    percentile: f64,
) -> f64 {
    let target = (total_count as f64 * percentile).ceil() as u64;
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for bucket in buckets {
        let upper_bound = bucket.get_upper_bound();
        let cumulative_count = bucket.get_cumulative_count();

        if cumulative_count >= target {
            let bucket_count = cumulative_count - prev_count;
            if bucket_count == 0 {
                return upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }

        prev_bound = upper_bound;
        prev_count = cumulative_count;
    }

    buckets.last().map(|b| b.get_upper_bound()).unwrap_or(0.0)
}
