#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Ticker Board - Live Security Table Reconciler
//!
//! Keeps a table of security rows in sync with a streaming key/value feed.
//! Each field change is classified as rising or falling against the value
//! last shown on screen, highlighted for a fixed duration, and published in
//! rate-bounded snapshots that a search filter narrows for display.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Reconciliation state with no runtime dependencies
//!   - `row`: Row keys, tracked fields, partial updates
//!   - `change`: Rising/falling classification
//!   - `store`: Row store with render-epoch baselines
//!   - `snapshot`: Immutable rendered tables
//!   - `search`: Search normalization and filtering
//!   - `format`: Display formatting of field values
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Feed events, sink and source trait
//!   - `services`: Engine, highlight timers, render scheduler, view
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket and simulated feed sources
//!   - `config`: Environment configuration
//!   - `health`: Health, metrics and snapshot endpoint
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! FeedSource ──► FeedSink ──► BoardEngine ──► RowStore
//!                               │    ▲
//!                     tick ─────┤    └── HighlightTimers (expiry)
//!                               ▼
//!                       RenderScheduler ──► watch<Snapshot> ──┐
//!                                                             ├─► BoardView
//!                       BoardHandle::set_search ─► watch<Search> ┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Reconciliation types with no runtime dependencies.
pub mod domain;

/// Application layer - Engine and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::change::{Direction, classify};
pub use domain::row::{Field, FieldUpdate, RowKey};
pub use domain::search::{SearchQuery, SearchSettings};
pub use domain::snapshot::{RowView, Snapshot};
pub use domain::store::{RowStore, UpsertOutcome};

// Application
pub use application::ports::{FeedError, FeedEvent, FeedSink, FeedSource};
pub use application::services::{
    BoardEngine, BoardFrame, BoardHandle, BoardView, EngineSettings, Subscription,
};

// Infrastructure config
pub use infrastructure::config::{BoardConfig, ConfigError};

// Metrics
pub use infrastructure::metrics::{get_metrics_handle, init_metrics};
