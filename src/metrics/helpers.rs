//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::dispatch::EventType;
use crate::occupancy::Occupancy;

use super::{
    DELIVERED_CHANNELS_TOTAL, DELIVERIES_SKIPPED_TOTAL, DELIVERIES_TOTAL,
    DISPATCHES_TOTAL, DISPATCH_FAILURES_TOTAL, OCCUPANCY_LOOKUPS_TOTAL,
    OCCUPANCY_REFRESHES_TOTAL, TRANSPORT_ERRORS_TOTAL, TRANSPORT_LATENCY, WEBHOOK_EVENTS_TOTAL,
    WEBHOOK_REJECTED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a packet published by a backend
    pub fn record_dispatched(event_type: EventType) {
        DISPATCHES_TOTAL
            .with_label_values(&[event_type.as_str()])
            .inc();
    }

    /// Record a failed dispatch
    pub fn record_failed(reason: &str) {
        DISPATCH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for recording transport-facing delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record a trigger call that reached the transport
    pub fn record_delivered(channels: usize) {
        DELIVERIES_TOTAL.inc();
        DELIVERED_CHANNELS_TOTAL.inc_by(channels as u64);
    }

    /// Record a delivery that never reached the transport
    pub fn record_skipped(reason: &str) {
        DELIVERIES_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_transport_error(operation: &str) {
        TRANSPORT_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn observe_latency(seconds: f64) {
        TRANSPORT_LATENCY.observe(seconds);
    }
}

pub struct OccupancyMetrics;

impl OccupancyMetrics {
    pub fn record_lookup(state: Occupancy) {
        OCCUPANCY_LOOKUPS_TOTAL
            .with_label_values(&[state.as_str()])
            .inc();
    }

    /// Record a cache lookup that failed
    pub fn record_lookup_error() {
        OCCUPANCY_LOOKUPS_TOTAL.with_label_values(&["error"]).inc();
    }

    /// Record a synchronous refresh (`ok` or `error`)
    pub fn record_refresh(outcome: &str) {
        OCCUPANCY_REFRESHES_TOTAL.with_label_values(&[outcome]).inc();
    }
}

pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn record_event(name: &str) {
        WEBHOOK_EVENTS_TOTAL.with_label_values(&[name]).inc();
    }

    pub fn record_rejected(reason: &str) {
        WEBHOOK_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }
}
