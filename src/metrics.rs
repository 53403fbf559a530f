use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("parish_throttle_requests_total", "Total number of API requests")
            .expect("register requests_total");
    pub static ref DECISIONS: IntCounterVec = register_int_counter_vec!(
        "parish_throttle_decisions_total",
        "Rate limit decisions by preset and outcome",
        &["preset", "outcome"]
    )
    .expect("register decisions_total");
    pub static ref REGISTRY_SIZE: IntGauge = register_int_gauge!(
        "parish_throttle_registry_entries",
        "Current number of keys held by the limiter"
    )
    .expect("register registry_entries");
    pub static ref SWEPT_ENTRIES: IntCounter = register_int_counter!(
        "parish_throttle_swept_entries_total",
        "Expired entries removed from the registry"
    )
    .expect("register swept_entries_total");
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "parish_throttle_request_latency_seconds",
        "Request latency in seconds"
    )
    .expect("register request_latency_seconds");
}

pub fn record_decision(preset: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    DECISIONS.with_label_values(&[preset, outcome]).inc();
}
