//! Feed Connection State
//!
//! Shared, lock-light view of the feed's connection health. Written by the
//! feed task, read by the health server.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Connection lifecycle of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected and not trying.
    Disconnected,
    /// Connection or link in progress.
    Connecting,
    /// Linked and receiving.
    Connected,
    /// Waiting before the next attempt.
    Reconnecting,
    /// Gave up or failed permanently.
    Error,
    /// The subscription was closed.
    Closed,
}

/// Serializable status of a feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    /// Feed name.
    pub feed: &'static str,
    /// Connection state.
    pub state: ConnectionState,
    /// Whether the server reported the initial state complete.
    pub synced: bool,
    /// When the feed last connected.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent error.
    pub error_message: Option<String>,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u32,
    /// Records received since start.
    pub messages_received: u64,
}

/// Connection health of one feed.
#[derive(Debug)]
pub struct FeedState {
    feed: &'static str,
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    error_message: RwLock<Option<String>>,
    synced: AtomicBool,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
}

impl FeedState {
    /// Create state for a named feed.
    #[must_use]
    pub const fn new(feed: &'static str) -> Self {
        Self {
            feed,
            state: RwLock::new(ConnectionState::Disconnected),
            last_connected_at: RwLock::new(None),
            error_message: RwLock::new(None),
            synced: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    /// Set the connection state.
    ///
    /// Entering `Connected` records the time and clears the error and the
    /// reconnect count. Leaving it clears the synced flag.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.error_message.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        } else {
            self.synced.store(false, Ordering::Relaxed);
        }
    }

    /// Record an error, entering the `Error` state.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.state.write() = ConnectionState::Error;
        *self.error_message.write() = Some(message.into());
        self.synced.store(false, Ordering::Relaxed);
    }

    /// Record a transient error without changing state.
    pub fn note_error(&self, message: impl Into<String>) {
        *self.error_message.write() = Some(message.into());
    }

    /// Mark the initial state as fully received.
    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Relaxed);
    }

    /// Count a reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a received record.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Feed name.
    #[must_use]
    pub const fn feed(&self) -> &'static str {
        self.feed
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the feed is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Records received since start.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Reconnect attempts since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Snapshot of the status for reporting.
    #[must_use]
    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            feed: self.feed,
            state: self.state(),
            synced: self.synced.load(Ordering::Relaxed),
            last_connected_at: *self.last_connected_at.read(),
            error_message: self.error_message.read().clone(),
            reconnect_attempts: self.reconnect_attempts(),
            messages_received: self.messages_received(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = FeedState::new("websocket");
        let status = state.status();

        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(status.last_connected_at.is_none());
        assert!(!state.is_connected());
    }

    #[test]
    fn connecting_clears_error_and_attempts() {
        let state = FeedState::new("websocket");
        state.increment_reconnect_attempts();
        state.increment_reconnect_attempts();
        state.set_error("refused");

        assert_eq!(state.status().error_message.as_deref(), Some("refused"));

        state.set_state(ConnectionState::Connected);
        state.set_synced(true);
        state.increment_messages();

        let status = state.status();
        assert_eq!(status.state, ConnectionState::Connected);
        assert!(status.synced);
        assert!(status.error_message.is_none());
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(status.messages_received, 1);
        assert!(status.last_connected_at.is_some());

        state.set_state(ConnectionState::Reconnecting);
        assert!(!state.status().synced);
    }

    #[test]
    fn status_serializes_lowercase_state() {
        let state = FeedState::new("simulated");
        let json = serde_json::to_value(state.status()).unwrap();
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["feed"], "simulated");
    }
}
