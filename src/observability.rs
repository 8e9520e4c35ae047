use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations created (direct bookings and queue promotions).
pub const BOOKINGS_CREATED_TOTAL: &str = "hotdesk_bookings_created_total";

/// Counter: reservation edits that committed.
pub const BOOKINGS_UPDATED_TOTAL: &str = "hotdesk_bookings_updated_total";

/// Counter: cancellations (user or admin).
pub const BOOKINGS_CANCELED_TOTAL: &str = "hotdesk_bookings_canceled_total";

/// Counter: queue entries promoted into reservations.
pub const QUEUE_PROMOTIONS_TOTAL: &str = "hotdesk_queue_promotions_total";

// ── USE metrics (background work and fan-out) ───────────────────

/// Counter: reconciliation passes that actually ran.
pub const RECONCILE_PASSES_TOTAL: &str = "hotdesk_reconcile_passes_total";

/// Counter: ticks skipped because a pass was still in flight.
pub const RECONCILE_SKIPPED_TOTAL: &str = "hotdesk_reconcile_skipped_total";

/// Counter: direct messages handed to the messenger.
pub const DIRECT_MESSAGES_TOTAL: &str = "hotdesk_direct_messages_total";

/// Gauge: currently registered live subscribers.
pub const LIVE_SUBSCRIBERS_ACTIVE: &str = "hotdesk_live_subscribers_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
