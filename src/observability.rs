use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "staybook_queries_total";

/// Histogram: command latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "staybook_query_duration_seconds";

/// Counter: booking requests refused for overlapping dates.
/// Labels: source (`check` = proactive scan, `store` = storage backstop).
pub const BOOKING_CONFLICTS_TOTAL: &str = "staybook_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "staybook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "staybook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "staybook_connections_rejected_total";

/// Counter: commands refused because the login user is not registered.
pub const UNKNOWN_USER_TOTAL: &str = "staybook_unknown_user_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "staybook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "staybook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::RegisterUser { .. } => "register_user",
        Command::ListSpot { .. } => "list_spot",
        Command::SelectSpots => "select_spots",
        Command::SelectSpot { .. } => "select_spot",
        Command::SelectOwnerSpots { .. } => "select_owner_spots",
        Command::UpdateSpot { .. } => "update_spot",
        Command::DeleteSpot { .. } => "delete_spot",
        Command::SelectMe => "select_me",
        Command::CreateBooking { .. } => "create_booking",
        Command::UpdateBooking { .. } => "update_booking",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::SelectMyBookings => "select_my_bookings",
        Command::SelectSpotBookings { .. } => "select_spot_bookings",
        Command::PostReview { .. } => "post_review",
        Command::EditReview { .. } => "edit_review",
        Command::DeleteReview { .. } => "delete_review",
        Command::SelectMyReviews => "select_my_reviews",
        Command::SelectSpotReviews { .. } => "select_spot_reviews",
    }
}
