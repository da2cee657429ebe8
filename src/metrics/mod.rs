//! Prometheus metrics for the dispatcher.
//!
//! - Dispatch metrics (packets published per event type, failures)
//! - Delivery metrics (transport calls, channels delivered, skipped deliveries)
//! - Occupancy metrics (cache lookups, refreshes)
//! - Webhook metrics

mod helpers;

pub use helpers::{
    encode_metrics, DeliveryMetrics, DispatchMetrics, OccupancyMetrics, WebhookMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "model_pusher";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Backends currently registered
    pub static ref BACKENDS_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_backends_registered", METRIC_PREFIX),
        "Number of registered dispatch backends"
    ).unwrap();

    /// Packets published on the notification bus, by event type
    pub static ref DISPATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatches_total", METRIC_PREFIX),
        "Total packets published by dispatch backends",
        &["event_type"]
    ).unwrap();

    /// Dispatch failures, by error kind
    pub static ref DISPATCH_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_failures_total", METRIC_PREFIX),
        "Total dispatch failures",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Trigger calls made against the transport
    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total trigger calls made against the transport"
    ).unwrap();

    /// Channels included in transport trigger calls
    pub static ref DELIVERED_CHANNELS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivered_channels_total", METRIC_PREFIX),
        "Total channels included in transport trigger calls"
    ).unwrap();

    /// Deliveries that never reached the transport
    pub static ref DELIVERIES_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_skipped_total", METRIC_PREFIX),
        "Deliveries skipped before reaching the transport",
        &["reason"]
    ).unwrap();

    /// Transport errors, by operation
    pub static ref TRANSPORT_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_transport_errors_total", METRIC_PREFIX),
        "Total transport errors",
        &["operation"]
    ).unwrap();

    /// Transport call latency
    pub static ref TRANSPORT_LATENCY: Histogram = register_histogram!(
        format!("{}_transport_latency_seconds", METRIC_PREFIX),
        "Transport call latency in seconds",
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    // ============================================================================
    // Occupancy Metrics
    // ============================================================================

    /// Occupancy cache lookups, by result (occupied, vacant, unknown, error)
    pub static ref OCCUPANCY_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_occupancy_lookups_total", METRIC_PREFIX),
        "Occupancy cache lookups",
        &["result"]
    ).unwrap();

    /// Synchronous cache refreshes, by outcome
    pub static ref OCCUPANCY_REFRESHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_occupancy_refreshes_total", METRIC_PREFIX),
        "Occupancy cache refreshes against the transport",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Webhook Metrics
    // ============================================================================

    /// Webhook events received, by name
    pub static ref WEBHOOK_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_events_total", METRIC_PREFIX),
        "Webhook events received",
        &["name"]
    ).unwrap();

    /// Webhook requests rejected, by reason
    pub static ref WEBHOOK_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_rejected_total", METRIC_PREFIX),
        "Webhook requests rejected",
        &["reason"]
    ).unwrap();
}
