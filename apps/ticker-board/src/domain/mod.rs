//! Domain Layer
//!
//! Pure reconciliation types. Nothing here depends on the async runtime:
//! time is passed in as [`std::time::Instant`] and timers are requested
//! through the [`store::HighlightScheduler`] port.

pub mod change;
pub mod format;
pub mod row;
pub mod search;
pub mod snapshot;
pub mod store;
