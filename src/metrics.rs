// Prometheus metrics definitions for the overlay server.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Browsers subscribed to the state event stream.
    pub static ref EVENT_STREAM_CLIENTS: IntGauge =
        IntGauge::new("overlay_event_stream_clients", "Connected state event stream clients").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Tail passes by profile and outcome (scanned, coalesced, unavailable).
    pub static ref TAIL_PASSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_tail_passes_total", "Log tail passes"),
        &["profile", "outcome"],
    )
    .unwrap();

    /// Complete log lines consumed, by profile.
    pub static ref LINES_SCANNED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_lines_scanned_total", "Complete log lines consumed"),
        &["profile"],
    )
    .unwrap();

    /// Times a profile's log file was found replaced or truncated.
    pub static ref LOG_ROTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_log_rotations_total", "Detected log file replacements"),
        &["profile"],
    )
    .unwrap();

    /// Zone or level changes, by profile.
    pub static ref STATE_CHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_state_changes_total", "Zone or level changes"),
        &["profile"],
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("overlay_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Tail pass duration in seconds, by profile.
    pub static ref TAIL_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("overlay_tail_duration_seconds", "Tail pass duration in seconds")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["profile"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENT_STREAM_CLIENTS.clone()),
        Box::new(TAIL_PASSES_TOTAL.clone()),
        Box::new(LINES_SCANNED_TOTAL.clone()),
        Box::new(LOG_ROTATIONS_TOTAL.clone()),
        Box::new(STATE_CHANGES_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(TAIL_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("Failed to register metric: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_after_register() {
        register_metrics();
        // Registering twice only warns.
        register_metrics();
        TAIL_PASSES_TOTAL
            .with_label_values(&["steam", "scanned"])
            .inc();
        let output = gather_metrics();
        assert!(output.contains("overlay_tail_passes_total"));
    }

    #[test]
    fn test_metric_increments() {
        EVENT_STREAM_CLIENTS.inc();
        EVENT_STREAM_CLIENTS.dec();

        LINES_SCANNED_TOTAL.with_label_values(&["steam"]).inc_by(3);
        assert!(LINES_SCANNED_TOTAL.with_label_values(&["steam"]).get() >= 3);

        LOG_ROTATIONS_TOTAL.with_label_values(&["stand_alone"]).inc();
        STATE_CHANGES_TOTAL.with_label_values(&["stand_alone"]).inc();
        TAIL_DURATION_SECONDS
            .with_label_values(&["steam"])
            .observe(0.002);
        API_REQUESTS_TOTAL
            .with_label_values(&["GET", "/data", "200"])
            .inc();
    }
}
