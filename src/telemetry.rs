// src/telemetry.rs
//! Prometheus counters, compiled in with the `metrics` feature. Without it
//! every recorder is a no-op.

#[cfg(feature = "metrics")]
mod prom {
    use once_cell::sync::Lazy;
    use prometheus::{register_int_counter_vec, IntCounterVec};

    pub static FETCHES_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register_int_counter_vec!(
            "market_matrix_fetches_total", "Instrument fetches", &["provider", "outcome"] // ok|empty|error
        ).ok()
    });

    pub static ROWS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
        register_int_counter_vec!(
            "market_matrix_rows_total", "Remote rows handled", &["outcome"] // updated|failed|unmatched
        ).ok()
    });
}

#[cfg(feature = "metrics")]
pub fn record_fetch(provider: &str, outcome: &str) {
    if let Some(c) = prom::FETCHES_TOTAL.as_ref() {
        c.with_label_values(&[provider, outcome]).inc();
    }
}

#[cfg(feature = "metrics")]
pub fn record_row(outcome: &str) {
    if let Some(c) = prom::ROWS_TOTAL.as_ref() {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Text exposition of the default registry.
#[cfg(feature = "metrics")]
pub fn render() -> String {
    use prometheus::Encoder;
    let mut buf = Vec::new();
    if prometheus::TextEncoder::new().encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(not(feature = "metrics"))]
pub fn record_fetch(_provider: &str, _outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_row(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn render() -> String { String::new() }
