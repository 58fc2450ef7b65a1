//! Application Services
//!
//! Services that own reconciliation state and coordinate the feed, the
//! timers and the presentation boundary.
//!
//! - `BoardEngine`: Single-writer actor owning the row store
//! - `HighlightTimers`: Per-field highlight expiry registry
//! - `RenderScheduler`: Rate-bounded snapshot publication
//! - `Subscription`: Idempotently closable feed subscription
//! - `BoardView`: Snapshot and search changes for presentation

mod engine;
mod scheduler;
mod subscription;
mod timers;
mod view;

pub use engine::{BoardEngine, BoardHandle, EngineSettings};
pub use scheduler::RenderScheduler;
pub use subscription::Subscription;
pub use timers::{HighlightKey, HighlightTimers};
pub use view::{BoardFrame, BoardView};
