//! Configuration Module
//!
//! Environment-driven configuration for the ticker board.

mod settings;

pub use settings::{
    BoardConfig, BoardSettings, ConfigError, FeedKind, FeedSettings, ReconnectSettings,
    ServerSettings, SimulationSettings,
};
