//! WebSocket Feed
//!
//! Links a map lane on a remote node and forwards its updates and removals
//! to the board.
//!
//! # Protocol
//!
//! After connecting, the client sends
//! `{"action":"link","node":"/symbols","lane":"stocks"}` and then receives
//! JSON records (see [`super::codec`]). When the subscription closes the
//! client sends the matching `unlink` and a close frame.
//!
//! Connection failures are retried with exponential backoff; the attempt
//! budget resets after each successful link.
//!
//! Rows the server dropped while the link was down are reconciled on the
//! first `synced` after a relink: every key delivered before the drop that
//! was not sent again is removed from the board. A relink that never
//! reaches `synced` prunes nothing.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use super::codec::{Control, FeedMessage, JsonCodec, LinkAction};
use super::reconnect::{BackoffConfig, ReconnectPolicy};
use super::state::{ConnectionState, FeedState};
use crate::application::ports::{FeedError, FeedEvent, FeedSink, FeedSource};
use crate::domain::row::RowKey;
use crate::infrastructure::config::{FeedSettings, ReconnectSettings};
use crate::infrastructure::metrics::{self, EventKind};

const FEED_NAME: &str = "websocket";

impl From<tungstenite::Error> for FeedError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// WebSocket feed configuration.
#[derive(Debug, Clone)]
pub struct WebSocketFeedConfig {
    /// Server URL.
    pub url: String,
    /// Node URI to link.
    pub node: String,
    /// Lane to link.
    pub lane: String,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
}

impl WebSocketFeedConfig {
    /// Build from configuration.
    #[must_use]
    pub fn from_settings(feed: &FeedSettings, reconnect: &ReconnectSettings) -> Self {
        Self {
            url: feed.url.clone(),
            node: feed.node.clone(),
            lane: feed.lane.clone(),
            backoff: BackoffConfig::from_settings(reconnect),
        }
    }
}

/// Keys the lane has delivered, kept across reconnects.
#[derive(Debug, Default)]
struct LaneKeys {
    known: HashSet<RowKey>,
    /// Keys sent again since the last relink, until the lane syncs.
    resent: Option<HashSet<RowKey>>,
}

impl LaneKeys {
    fn relinked(&mut self) {
        self.resent = (!self.known.is_empty()).then(HashSet::new);
    }

    fn observe(&mut self, event: &FeedEvent) {
        match event {
            FeedEvent::Upsert { key, .. } => {
                if let Some(resent) = &mut self.resent {
                    resent.insert(key.clone());
                }
                self.known.insert(key.clone());
            }
            FeedEvent::Remove { key } => {
                if let Some(resent) = &mut self.resent {
                    resent.remove(key);
                }
                self.known.remove(key);
            }
        }
    }

    /// Keys to remove now that the lane has synced.
    fn synced(&mut self) -> Vec<RowKey> {
        let Some(resent) = self.resent.take() else {
            return Vec::new();
        };
        let stale: Vec<RowKey> = self
            .known
            .iter()
            .filter(|key| !resent.contains(*key))
            .cloned()
            .collect();
        for key in &stale {
            self.known.remove(key);
        }
        stale
    }
}

/// Feed source backed by a WebSocket map-lane subscription.
#[derive(Debug)]
pub struct WebSocketFeed {
    config: WebSocketFeedConfig,
    codec: JsonCodec,
    state: Arc<FeedState>,
}

impl WebSocketFeed {
    /// Create a WebSocket feed reporting into `state`.
    #[must_use]
    pub const fn new(config: WebSocketFeedConfig, state: Arc<FeedState>) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            state,
        }
    }

    fn finish(&self) -> Result<(), FeedError> {
        self.state.set_state(ConnectionState::Closed);
        metrics::set_feed_connected(FEED_NAME, false);
        tracing::info!(url = %self.config.url, "WebSocket feed stopped");
        Ok(())
    }

    async fn connect_and_run(
        &self,
        sink: &FeedSink,
        policy: &mut ReconnectPolicy,
        keys: &mut LaneKeys,
    ) -> Result<(), FeedError> {
        tracing::info!(url = %self.config.url, "Connecting to feed");

        let (ws_stream, _response) = tokio::select! {
            () = sink.closed() => return Ok(()),
            res = tokio_tungstenite::connect_async(self.config.url.as_str()) => res?,
        };

        let (mut write, mut read) = ws_stream.split();

        let link = self
            .codec
            .encode_link(LinkAction::Link, &self.config.node, &self.config.lane)?;
        write.send(Message::Text(link.into())).await?;
        keys.relinked();

        self.state.set_state(ConnectionState::Connected);
        metrics::set_feed_connected(FEED_NAME, true);
        policy.reset();
        tracing::info!(
            node = %self.config.node,
            lane = %self.config.lane,
            "Linked feed lane"
        );

        loop {
            tokio::select! {
                () = sink.closed() => {
                    self.unlink(&mut write).await;
                    return Ok(());
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        match self.handle_text(text.as_str(), sink, keys).await {
                            Err(FeedError::SinkClosed) => {
                                self.unlink(&mut write).await;
                                return Ok(());
                            }
                            other => other?,
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        return Err(FeedError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Err(FeedError::ConnectionClosed);
                    }
                },
            }
        }
    }

    async fn unlink<W>(&self, write: &mut W)
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        match self
            .codec
            .encode_link(LinkAction::Unlink, &self.config.node, &self.config.lane)
        {
            Ok(unlink) => {
                if let Err(e) = write.send(Message::Text(unlink.into())).await {
                    tracing::debug!(error = %e, "Failed to send unlink");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Failed to encode unlink"),
        }

        if let Err(e) = write.close().await {
            tracing::debug!(error = %e, "Failed to close WebSocket");
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        sink: &FeedSink,
        keys: &mut LaneKeys,
    ) -> Result<(), FeedError> {
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                metrics::record_feed_error(FEED_NAME, "decode");
                return Ok(());
            }
        };

        for message in messages {
            self.state.increment_messages();
            match message {
                FeedMessage::Event(event) => {
                    keys.observe(&event);
                    sink.send(event).await?;
                }
                FeedMessage::Control(Control::Linked) => tracing::debug!("Lane linked"),
                FeedMessage::Control(Control::Synced) => {
                    self.state.set_synced(true);
                    let stale = keys.synced();
                    tracing::info!(pruned = stale.len(), "Lane synced");
                    for key in stale {
                        sink.send(FeedEvent::remove(key)).await?;
                    }
                }
                FeedMessage::Control(Control::Unlinked) => {
                    tracing::warn!("Server unlinked lane");
                    return Err(FeedError::ConnectionClosed);
                }
                FeedMessage::Skipped(reason) => {
                    tracing::debug!(reason, "Skipped feed record");
                    metrics::record_feed_event(EventKind::Ignored);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FeedSource for WebSocketFeed {
    fn name(&self) -> &'static str {
        FEED_NAME
    }

    async fn run(self: Box<Self>, sink: FeedSink) -> Result<(), FeedError> {
        let mut policy = ReconnectPolicy::new(self.config.backoff.clone());
        let mut keys = LaneKeys::default();

        loop {
            if sink.is_closed() {
                return self.finish();
            }

            self.state.set_state(ConnectionState::Connecting);

            match self.connect_and_run(&sink, &mut policy, &mut keys).await {
                Ok(()) | Err(FeedError::SinkClosed) => return self.finish(),
                Err(e) => {
                    tracing::warn!(error = %e, "Feed connection error");
                    metrics::record_feed_error(FEED_NAME, e.kind());
                    metrics::set_feed_connected(FEED_NAME, false);
                    self.state.note_error(e.to_string());

                    let delay = match policy.next_delay() {
                        Ok(delay) => delay,
                        Err(exhausted) => {
                            self.state.set_error(exhausted.to_string());
                            return Err(exhausted.into());
                        }
                    };

                    self.state.set_state(ConnectionState::Reconnecting);
                    self.state.increment_reconnect_attempts();
                    metrics::record_feed_reconnect(FEED_NAME);
                    tracing::info!(
                        attempt = policy.attempt_count(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconnecting to feed"
                    );

                    tokio::select! {
                        () = sink.closed() => return self.finish(),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::ports::FeedEvent;
    use crate::application::services::Subscription;
    use crate::domain::row::{Field, FieldUpdate};

    fn config(url: String, max_attempts: u32) -> WebSocketFeedConfig {
        WebSocketFeedConfig {
            url,
            node: "/symbols".to_string(),
            lane: "stocks".to_string(),
            backoff: BackoffConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
                jitter: 0.0,
                max_attempts,
            },
        }
    }

    #[tokio::test]
    async fn links_forwards_and_unlinks() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let link = ws.next().await.unwrap().unwrap();
            assert_eq!(
                link.into_text().unwrap().as_str(),
                r#"{"action":"link","node":"/symbols","lane":"stocks"}"#
            );

            let frames = [
                r#"{"event":"linked"}"#,
                r#"[{"event":"update","key":"DIS","value":{"price":109.5}},{"event":"remove","key":"AAPL"}]"#,
                "garbage",
                r#"{"event":"synced"}"#,
            ];
            for frame in frames {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }

            // Next frame from the client is the unlink.
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                    Some(Ok(_)) => {}
                    other => panic!("unexpected {other:?}"),
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(8);
        let subscription = Subscription::new("/symbols", "stocks");
        let sink = FeedSink::new(tx, subscription.clone());
        let state = Arc::new(FeedState::new(FEED_NAME));
        let feed = Box::new(WebSocketFeed::new(config(url, 0), Arc::clone(&state)));
        let client = tokio::spawn(feed.run(sink));

        let first = rx.recv().await.unwrap();
        match first {
            FeedEvent::Upsert { key, update } => {
                assert_eq!(key.as_str(), "DIS");
                assert_eq!(update.get(Field::Price), Some(109.5));
            }
            other => panic!("expected upsert, got {other:?}"),
        }
        assert_eq!(rx.recv().await.unwrap(), FeedEvent::remove("AAPL"));
        assert!(state.is_connected());

        subscription.close();
        let unlink = server.await.unwrap();
        assert_eq!(
            unlink,
            r#"{"action":"unlink","node":"/symbols","lane":"stocks"}"#
        );

        client.await.unwrap().unwrap();
        assert_eq!(state.state(), ConnectionState::Closed);
    }

    fn describe(event: FeedEvent) -> String {
        match event {
            FeedEvent::Upsert { key, .. } => format!("+{key}"),
            FeedEvent::Remove { key } => format!("-{key}"),
        }
    }

    #[tokio::test]
    async fn relink_prunes_rows_not_resent_before_sync() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.next().await.unwrap().unwrap();
            for frame in [
                r#"{"event":"update","key":"DIS","value":{"price":1}}"#,
                r#"{"event":"update","key":"AAPL","value":{"price":2}}"#,
                r#"{"event":"synced"}"#,
            ] {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            let _ = ws.close(None).await;
            drop(ws);

            // AAPL was deleted while the client was away.
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.next().await.unwrap().unwrap();
            for frame in [
                r#"{"event":"update","key":"DIS","value":{"price":3}}"#,
                r#"{"event":"synced"}"#,
            ] {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    break;
                }
            }
        });

        let (tx, mut rx) = mpsc::channel(8);
        let subscription = Subscription::new("/symbols", "stocks");
        let sink = FeedSink::new(tx, subscription.clone());
        let state = Arc::new(FeedState::new(FEED_NAME));
        let feed = Box::new(WebSocketFeed::new(config(url, 3), Arc::clone(&state)));
        let client = tokio::spawn(feed.run(sink));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(describe(rx.recv().await.unwrap()));
        }
        assert_eq!(seen, ["+DIS", "+AAPL", "+DIS", "-AAPL"]);

        subscription.close();
        server.await.unwrap();
        client.await.unwrap().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn first_link_prunes_nothing() {
        let mut keys = LaneKeys::default();
        keys.relinked();
        keys.observe(&FeedEvent::upsert("DIS", FieldUpdate::new()));

        assert!(keys.synced().is_empty());
    }

    #[test]
    fn only_the_latest_relink_counts_as_resent() {
        let mut keys = LaneKeys::default();
        keys.observe(&FeedEvent::upsert("DIS", FieldUpdate::new()));
        keys.observe(&FeedEvent::upsert("AAPL", FieldUpdate::new()));

        // Dropped again before syncing; the next relink starts over.
        keys.relinked();
        keys.observe(&FeedEvent::upsert("DIS", FieldUpdate::new()));
        keys.relinked();
        keys.observe(&FeedEvent::upsert("AAPL", FieldUpdate::new()));
        keys.observe(&FeedEvent::remove("AAPL"));

        assert_eq!(keys.synced(), vec![RowKey::new("DIS")]);
        assert!(keys.synced().is_empty());
        assert!(keys.known.is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let (tx, _rx) = mpsc::channel(8);
        let sink = FeedSink::new(tx, Subscription::new("/symbols", "stocks"));
        let state = Arc::new(FeedState::new(FEED_NAME));
        let feed = Box::new(WebSocketFeed::new(config(url, 2), Arc::clone(&state)));

        let err = feed.run(sink).await.unwrap_err();

        assert!(matches!(err, FeedError::ReconnectExhausted { attempts: 2 }));
        assert_eq!(state.state(), ConnectionState::Error);
        assert!(state.status().error_message.is_some());
    }
}
