//! Application Layer - Use cases and port definitions.
//!
//! This layer owns the board engine and defines the feed boundary that
//! infrastructure adapters drive.

/// Port interfaces for feed sources.
pub mod ports;

/// Board engine, timers, render scheduler and presentation view.
pub mod services;
