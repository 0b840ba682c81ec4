//! # Telemetry module
//!
//! Domain metrics emitted by the controller runtime (C5): reconciliation
//! outcomes and durations per resource kind. HTTP-surface metrics (access
//! log counters, the `/metrics` exposition endpoint itself) live under
//! `svc::http` instead -- this module only owns the counters the engine
//! itself produces.

#[cfg(feature = "metrics")]
mod prom {
    use std::sync::LazyLock;

    use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

    pub static RECONCILE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec!(
            "neutree_core_reconcile_total",
            "number of reconcile attempts per resource kind and outcome",
            &["kind", "result"]
        )
        .expect("'neutree_core_reconcile_total' to not be already registered")
    });

    pub static QUEUE_DEPTH: LazyLock<HistogramVec> = LazyLock::new(|| {
        register_histogram_vec!(
            "neutree_core_queue_depth",
            "pending work queue depth sampled per resource kind",
            &["kind"]
        )
        .expect("'neutree_core_queue_depth' to not be already registered")
    });
}

/// Record the outcome of one reconcile attempt for `kind`.
#[cfg(feature = "metrics")]
pub fn observe_reconcile(kind: &str, succeeded: bool) {
    let result = if succeeded { "success" } else { "error" };
    prom::RECONCILE_TOTAL.with_label_values(&[kind, result]).inc();
}

/// Sample the current pending-queue depth for `kind`.
#[cfg(feature = "metrics")]
pub fn observe_queue_depth(kind: &str, depth: usize) {
    prom::QUEUE_DEPTH.with_label_values(&[kind]).observe(depth as f64);
}
