//! Health, Metrics and Snapshot Endpoints
//!
//! HTTP surface for orchestrators, monitoring, and simple clients that
//! want the rendered table without a WebSocket.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status with board and feed details
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (feed connected)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /snapshot?search=AB` - Latest snapshot, filtered and formatted

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::BoardHandle;
use crate::domain::change::Direction;
use crate::domain::format::format_field;
use crate::domain::row::{Field, RowKey};
use crate::domain::search::SearchQuery;
use crate::domain::snapshot::RowView;
use crate::infrastructure::feed::{ConnectionState, FeedState, FeedStatus};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Board state.
    pub board: BoardStatus,
    /// Feed connection state.
    pub feed: FeedStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed linked, board running.
    Healthy,
    /// Feed connecting or reconnecting.
    Degraded,
    /// Feed down or board stopped.
    Unhealthy,
}

/// Board summary.
#[derive(Debug, Clone, Serialize)]
pub struct BoardStatus {
    /// Rows in the latest snapshot.
    pub rows: usize,
    /// Render generation of the latest snapshot.
    pub generation: u64,
    /// Current search text.
    pub search: String,
    /// Whether the feed subscription is still open.
    pub subscribed: bool,
}

/// Query parameters for `/snapshot`.
#[derive(Debug, Default, Deserialize)]
pub struct SnapshotParams {
    /// Search text; the board's current search is used when absent.
    pub search: Option<String>,
}

/// One formatted cell.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotCell {
    /// Raw value.
    pub value: Option<f64>,
    /// Display string.
    pub display: String,
    /// Field highlight.
    pub highlight: Direction,
}

/// One formatted row.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    /// Row key.
    pub key: RowKey,
    /// Row-level highlight.
    pub highlight: Direction,
    /// Source timestamp (epoch seconds).
    pub timestamp: Option<i64>,
    /// Cells for every tracked field.
    pub cells: BTreeMap<Field, SnapshotCell>,
}

impl From<&RowView> for SnapshotRow {
    fn from(row: &RowView) -> Self {
        let cells = Field::all()
            .iter()
            .map(|&field| {
                let value = row.value(field);
                let cell = SnapshotCell {
                    value,
                    display: format_field(field, value),
                    highlight: row.field_highlight(field),
                };
                (field, cell)
            })
            .collect();

        Self {
            key: row.key.clone(),
            highlight: row.highlight,
            timestamp: row.timestamp,
            cells,
        }
    }
}

/// Snapshot response.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    /// Render generation.
    pub generation: u64,
    /// Normalized search applied.
    pub query: String,
    /// Rows before filtering.
    pub total_rows: usize,
    /// Matching rows in insertion order.
    pub rows: Vec<SnapshotRow>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
#[derive(Debug)]
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    board: BoardHandle,
    feed: Arc<FeedState>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: impl Into<String>, board: BoardHandle, feed: Arc<FeedState>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            board,
            feed,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Build the HTTP router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/snapshot", get(snapshot_handler))
        .with_state(state)
}

/// Health check HTTP server.
#[derive(Debug)]
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.feed.is_connected() && !state.board.is_shutdown() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn snapshot_handler(
    State(state): State<Arc<HealthServerState>>,
    Query(params): Query<SnapshotParams>,
) -> Json<SnapshotResponse> {
    let query = params.search.map_or_else(
        || state.board.search(),
        |raw| SearchQuery::new(&raw, state.board.search_settings()),
    );
    let snapshot = state.board.snapshot();

    Json(SnapshotResponse {
        generation: snapshot.generation(),
        query: query.as_str().to_string(),
        total_rows: snapshot.len(),
        rows: query.filter(&snapshot).iter().map(SnapshotRow::from).collect(),
    })
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let feed = state.feed.status();
    let snapshot = state.board.snapshot();
    let status = determine_health_status(feed.state, state.board.is_shutdown());

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        board: BoardStatus {
            rows: snapshot.len(),
            generation: snapshot.generation(),
            search: state.board.search().as_str().to_string(),
            subscribed: !state.board.subscription().is_closed(),
        },
        feed,
    }
}

const fn determine_health_status(feed: ConnectionState, board_stopped: bool) -> HealthStatus {
    if board_stopped {
        return HealthStatus::Unhealthy;
    }

    match feed {
        ConnectionState::Connected => HealthStatus::Healthy,
        ConnectionState::Connecting | ConnectionState::Reconnecting => HealthStatus::Degraded,
        ConnectionState::Disconnected | ConnectionState::Error | ConnectionState::Closed => {
            HealthStatus::Unhealthy
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::row::FieldValues;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn status_follows_feed_state() {
        assert_eq!(
            determine_health_status(ConnectionState::Connected, false),
            HealthStatus::Healthy
        );
        assert_eq!(
            determine_health_status(ConnectionState::Reconnecting, false),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_health_status(ConnectionState::Error, false),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            determine_health_status(ConnectionState::Connected, true),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn snapshot_row_formats_every_field() {
        let mut values = FieldValues::new();
        values.insert(Field::Price, 109.5);
        values.insert(Field::Volume, 1_250_000.0);
        let mut highlights = BTreeMap::new();
        highlights.insert(Field::Price, Direction::Rising);

        let row = SnapshotRow::from(&RowView::new(RowKey::new("DIS"), values, highlights, Some(1)));

        assert_eq!(row.cells.len(), Field::all().len());
        assert_eq!(row.cells[&Field::Price].display, "109.50");
        assert_eq!(row.cells[&Field::Price].highlight, Direction::Rising);
        assert_eq!(row.cells[&Field::Volume].display, "1,250,000");
        assert_eq!(row.cells[&Field::Ask].display, "--");
        assert_eq!(row.highlight, Direction::Rising);
    }
}
