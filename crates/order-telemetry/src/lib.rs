//! # Order Telemetry - Metrics & Observability
//!
//! Prometheus metrics for the order tracking engine:
//! - Active tracking sessions
//! - Fetch outcomes and latency per collaborator
//! - Coalesced (skipped) fetches
//! - Terminal status transitions

use order_core::DeliveryStatus;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Metrics collector for tracking sessions
pub struct TrackingMetrics {
    registry: Registry,

    sessions_active: IntGauge,
    fetches_total: IntCounterVec,
    fetches_coalesced: IntCounterVec,
    fetch_duration: HistogramVec,
    terminal_transitions: IntCounterVec,
}

impl TrackingMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let sessions_active = IntGauge::new(
            "order_tracking_sessions_active",
            "Number of live tracking sessions",
        )?;
        registry.register(Box::new(sessions_active.clone()))?;

        let fetches_total = IntCounterVec::new(
            Opts::new("order_tracking_fetches_total", "Collaborator fetches by outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;

        let fetches_coalesced = IntCounterVec::new(
            Opts::new(
                "order_tracking_fetches_coalesced_total",
                "Fetches skipped because one was already in flight",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(fetches_coalesced.clone()))?;

        let fetch_duration = HistogramVec::new(
            HistogramOpts::new("order_tracking_fetch_seconds", "Collaborator fetch latency")
                .buckets(vec![0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["kind"],
        )?;
        registry.register(Box::new(fetch_duration.clone()))?;

        let terminal_transitions = IntCounterVec::new(
            Opts::new(
                "order_tracking_terminal_total",
                "Sessions that reached a terminal status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(terminal_transitions.clone()))?;

        Ok(Self {
            registry,
            sessions_active,
            fetches_total,
            fetches_coalesced,
            fetch_duration,
            terminal_transitions,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Set the number of live sessions
    pub fn set_active_sessions(&self, count: i64) {
        self.sessions_active.set(count);
    }

    /// Record a completed fetch
    pub fn record_fetch(&self, kind: &str, outcome: &str, duration_secs: f64) {
        self.fetches_total.with_label_values(&[kind, outcome]).inc();
        self.fetch_duration
            .with_label_values(&[kind])
            .observe(duration_secs);
    }

    /// Record a fetch skipped by the single-flight rule
    pub fn record_coalesced(&self, kind: &str) {
        self.fetches_coalesced.with_label_values(&[kind]).inc();
    }

    /// Record a session reaching a terminal status
    pub fn record_terminal(&self, status: DeliveryStatus) {
        let status = status.to_string();
        self.terminal_transitions
            .with_label_values(&[status.as_str()])
            .inc();
    }
}

// ============================================================================
// TESTS
// ============================================================================
