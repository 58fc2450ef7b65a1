//! Infrastructure Layer - Adapters and external integrations.

/// Environment configuration.
pub mod config;

/// Feed adapters (WebSocket, simulated).
pub mod feed;

/// Health, metrics and snapshot HTTP endpoints.
pub mod health;

/// Prometheus metrics.
pub mod metrics;

/// Logging and tracing setup.
pub mod telemetry;
