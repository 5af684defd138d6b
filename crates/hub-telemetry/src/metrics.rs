//! Prometheus metrics for the block distribution hub.
//!
//! All metrics follow the naming convention: `hub_<area>_<metric>_<unit>`
//!
//! Channel labels are `block`, `logs` and `filter`.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, GaugeVec, Histogram, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PIPELINE
    // =========================================================================

    /// Records handed to the hub by the pipeline
    pub static ref RECORDS_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("hub_records_processed_total", "Records processed by the hub"),
        &["outcome"]  // outcome: ok/error
    ).expect("metric creation failed");

    /// End-to-end processing time of one record
    pub static ref PROCESS_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "hub_process_duration_seconds",
            "Time spent processing one record"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // SUBSCRIBERS
    // =========================================================================

    /// Live subscriber connections
    pub static ref SUBSCRIBERS: GaugeVec = GaugeVec::new(
        Opts::new("hub_subscribers", "Live subscriber connections"),
        &["channel"]
    ).expect("metric creation failed");

    /// Frames delivered to subscribers
    pub static ref FRAMES_SENT: CounterVec = CounterVec::new(
        Opts::new("hub_frames_sent_total", "Frames delivered to subscribers"),
        &["channel"]
    ).expect("metric creation failed");

    /// Connections dropped after a failed or timed-out send
    pub static ref CONNECTIONS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("hub_connections_dropped_total", "Connections dropped on send failure"),
        &["channel", "reason"]  // reason: error/timeout
    ).expect("metric creation failed");

    // =========================================================================
    // FILTER GATE
    // =========================================================================

    /// Filter round-trip latency
    pub static ref GATE_ROUND_TRIP: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "hub_gate_round_trip_seconds",
            "Time between sending a record to the filter and decoding its reply"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Records that passed the gate with no filter attached
    pub static ref GATE_PASS_THROUGH: Counter = Counter::new(
        "hub_gate_pass_through_total",
        "Records that passed the gate with no filter attached"
    ).expect("metric creation failed");

    /// Filter exchanges that failed
    pub static ref GATE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("hub_gate_failures_total", "Failed filter exchanges"),
        &["reason"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECORDS_PROCESSED.clone()),
        Box::new(PROCESS_DURATION.clone()),
        Box::new(SUBSCRIBERS.clone()),
        Box::new(FRAMES_SENT.clone()),
        Box::new(CONNECTIONS_DROPPED.clone()),
        Box::new(GATE_ROUND_TRIP.clone()),
        Box::new(GATE_PASS_THROUGH.clone()),
        Box::new(GATE_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
