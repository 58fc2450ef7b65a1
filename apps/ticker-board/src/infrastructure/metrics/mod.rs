//! Prometheus Metrics Module
//!
//! Exposes board metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Feed**: Events received by kind, errors, reconnects, connection state
//! - **Board**: Row count, renders, render duration
//! - **Highlights**: Highlights started by direction and expired
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::change::Direction;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            #[allow(clippy::expect_used)]
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Feed
    describe_counter!(
        "ticker_board_feed_events_total",
        "Feed events received by kind"
    );
    describe_counter!(
        "ticker_board_feed_errors_total",
        "Feed errors by type"
    );
    describe_counter!(
        "ticker_board_feed_reconnects_total",
        "Feed reconnection attempts"
    );
    describe_gauge!(
        "ticker_board_feed_connected",
        "Whether the feed is currently connected (1) or not (0)"
    );

    // Board
    describe_gauge!("ticker_board_rows", "Rows currently in the board");
    describe_counter!("ticker_board_renders_total", "Snapshots rendered");
    describe_histogram!(
        "ticker_board_render_seconds",
        "Time to materialize one snapshot"
    );

    // Highlights
    describe_counter!(
        "ticker_board_highlights_started_total",
        "Field highlights started by direction"
    );
    describe_counter!(
        "ticker_board_highlights_expired_total",
        "Field highlights cleared by their expiry timer"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for feed event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Insert or update.
    Upsert,
    /// Row removal.
    Remove,
    /// Dropped because the subscription was closed or the payload was unusable.
    Ignored,
}

impl EventKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Remove => "remove",
            Self::Ignored => "ignored",
        }
    }
}

/// Record a feed event reaching the board.
pub fn record_feed_event(kind: EventKind) {
    counter!(
        "ticker_board_feed_events_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a feed error.
pub fn record_feed_error(feed: &'static str, error_type: &'static str) {
    counter!(
        "ticker_board_feed_errors_total",
        "feed" => feed,
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a feed reconnection attempt.
pub fn record_feed_reconnect(feed: &'static str) {
    counter!(
        "ticker_board_feed_reconnects_total",
        "feed" => feed
    )
    .increment(1);
}

/// Update the feed connection gauge.
pub fn set_feed_connected(feed: &'static str, connected: bool) {
    gauge!(
        "ticker_board_feed_connected",
        "feed" => feed
    )
    .set(if connected { 1.0 } else { 0.0 });
}

/// Update the row count gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_rows(count: usize) {
    gauge!("ticker_board_rows").set(count as f64);
}

/// Record one rendered snapshot.
pub fn record_render(duration: Duration) {
    counter!("ticker_board_renders_total").increment(1);
    histogram!("ticker_board_render_seconds").record(duration.as_secs_f64());
}

/// Record a highlight started on a field.
pub fn record_highlight_started(direction: Direction) {
    counter!(
        "ticker_board_highlights_started_total",
        "direction" => direction.as_str()
    )
    .increment(1);
}

/// Record a highlight cleared by its timer.
pub fn record_highlight_expired() {
    counter!("ticker_board_highlights_expired_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
