use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "hotelbook_http_requests_total";

/// Counter: booking attempts. Labels: outcome (confirmed, conflict, invalid, error).
pub const BOOKINGS_TOTAL: &str = "hotelbook_bookings_total";

/// Histogram: end-to-end booking latency in seconds, lock wait included.
pub const BOOKING_DURATION_SECONDS: &str = "hotelbook_booking_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: time spent waiting for a calendar lock, in seconds.
pub const LOCK_WAIT_SECONDS: &str = "hotelbook_lock_wait_seconds";

/// Counter: lock acquisitions that gave up after the timeout.
pub const LOCK_TIMEOUTS_TOTAL: &str = "hotelbook_lock_timeouts_total";

/// Gauge: provisioned calendar rows across all hotels.
pub const CALENDAR_DAYS: &str = "hotelbook_calendar_days";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hotelbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hotelbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
