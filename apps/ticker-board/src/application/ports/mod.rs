//! Port Interfaces
//!
//! The feed boundary between data sources and the board engine, following
//! the Hexagonal Architecture pattern.
//!
//! ## Driver Ports (Inbound)
//!
//! - [`FeedSource`]: Implemented by feed adapters (WebSocket, simulated)
//! - [`FeedSink`]: Handed to a feed source; delivers [`FeedEvent`]s to the
//!   engine and carries the [`Subscription`] that ends the feed

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::application::services::Subscription;
use crate::domain::row::{FieldUpdate, RowKey};

// =============================================================================
// Feed Events
// =============================================================================

/// A change delivered by the upstream data source.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Insert or partially update a row.
    Upsert {
        /// Row key.
        key: RowKey,
        /// Defined field values.
        update: FieldUpdate,
    },
    /// Remove a row.
    Remove {
        /// Row key.
        key: RowKey,
    },
}

impl FeedEvent {
    /// Build an upsert event.
    #[must_use]
    pub fn upsert(key: impl Into<RowKey>, update: FieldUpdate) -> Self {
        Self::Upsert {
            key: key.into(),
            update,
        }
    }

    /// Build a remove event.
    #[must_use]
    pub fn remove(key: impl Into<RowKey>) -> Self {
        Self::Remove { key: key.into() }
    }

    /// Key the event applies to.
    #[must_use]
    pub const fn key(&self) -> &RowKey {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key } => key,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that end or interrupt a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport failure (connect, read, write).
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The board stopped accepting events or the subscription was closed.
    #[error("feed sink closed")]
    SinkClosed,

    /// Reconnect attempts were exhausted.
    #[error("giving up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl FeedError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::ConnectionClosed => "closed",
            Self::SinkClosed => "sink_closed",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }
}

// =============================================================================
// Feed Sink
// =============================================================================

/// Delivers feed events to the board engine.
///
/// Events sent after the subscription closes are rejected with
/// [`FeedError::SinkClosed`].
#[derive(Debug, Clone)]
pub struct FeedSink {
    tx: mpsc::Sender<FeedEvent>,
    subscription: Subscription,
}

impl FeedSink {
    /// Create a sink over the engine's event channel.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<FeedEvent>, subscription: Subscription) -> Self {
        Self { tx, subscription }
    }

    /// Send one event, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SinkClosed`] if the subscription is closed or
    /// the engine has stopped.
    pub async fn send(&self, event: FeedEvent) -> Result<(), FeedError> {
        if self.subscription.is_closed() {
            return Err(FeedError::SinkClosed);
        }
        self.tx.send(event).await.map_err(|_| FeedError::SinkClosed)
    }

    /// Send an upsert.
    ///
    /// # Errors
    ///
    /// See [`FeedSink::send`].
    pub async fn upsert(&self, key: impl Into<RowKey>, update: FieldUpdate) -> Result<(), FeedError> {
        self.send(FeedEvent::upsert(key, update)).await
    }

    /// Send a remove.
    ///
    /// # Errors
    ///
    /// See [`FeedSink::send`].
    pub async fn remove(&self, key: impl Into<RowKey>) -> Result<(), FeedError> {
        self.send(FeedEvent::remove(key)).await
    }

    /// The subscription this sink feeds.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Whether events are no longer accepted.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscription.is_closed() || self.tx.is_closed()
    }

    /// Wait until the subscription closes or the engine stops.
    pub async fn closed(&self) {
        tokio::select! {
            () = self.subscription.closed() => {}
            () = self.tx.closed() => {}
        }
    }
}

// =============================================================================
// Feed Source
// =============================================================================

/// An upstream data source driving the board.
#[async_trait]
pub trait FeedSource: Send {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Run until the sink closes or the source gives up.
    ///
    /// Returning `Ok(())` means the subscription was closed.
    async fn run(self: Box<Self>, sink: FeedSink) -> Result<(), FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::row::Field;

    #[tokio::test]
    async fn sink_rejects_after_close() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = FeedSink::new(tx, Subscription::new("/symbols", "stocks"));

        sink.upsert("DIS", FieldUpdate::new().with(Field::Price, 1.0))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().key().as_str(), "DIS");

        sink.subscription().close();
        assert!(sink.is_closed());
        assert!(matches!(sink.remove("DIS").await, Err(FeedError::SinkClosed)));
        sink.closed().await;
    }

    #[tokio::test]
    async fn sink_reports_stopped_engine() {
        let (tx, rx) = mpsc::channel(1);
        let sink = FeedSink::new(tx, Subscription::new("/symbols", "stocks"));
        drop(rx);

        assert!(sink.is_closed());
        assert!(matches!(sink.remove("DIS").await, Err(FeedError::SinkClosed)));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(FeedError::SinkClosed.kind(), "sink_closed");
        assert_eq!(
            FeedError::ReconnectExhausted { attempts: 3 }.to_string(),
            "giving up after 3 reconnect attempts"
        );
    }
}
