//! Feed Adapters
//!
//! Implements [`FeedSource`] for the board's upstream data:
//!
//! - **WebSocket**: Map-lane subscription to a remote node (JSON codec)
//! - **Simulated**: Local random walk for demos and tests

pub mod codec;
pub mod reconnect;
pub mod simulated;
pub mod state;
pub mod websocket;

use std::sync::Arc;

pub use codec::{CodecError, Control, FeedMessage, JsonCodec, LinkAction};
pub use reconnect::{BackoffConfig, ReconnectError, ReconnectPolicy};
pub use simulated::SimulatedFeed;
pub use state::{ConnectionState, FeedState, FeedStatus};
pub use websocket::{WebSocketFeed, WebSocketFeedConfig};

use crate::application::ports::FeedSource;
use crate::infrastructure::config::{BoardConfig, FeedKind};

/// Build the configured feed source and the state it reports into.
#[must_use]
pub fn build_feed(config: &BoardConfig) -> (Box<dyn FeedSource>, Arc<FeedState>) {
    match config.feed.kind {
        FeedKind::Simulated => {
            let state = Arc::new(FeedState::new("simulated"));
            let feed = SimulatedFeed::new(&config.simulation, Arc::clone(&state));
            (Box::new(feed), state)
        }
        FeedKind::WebSocket => {
            let state = Arc::new(FeedState::new("websocket"));
            let feed_config = WebSocketFeedConfig::from_settings(&config.feed, &config.reconnect);
            (Box::new(WebSocketFeed::new(feed_config, Arc::clone(&state))), state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_kind() {
        let mut config = BoardConfig::default();
        let (feed, state) = build_feed(&config);
        assert_eq!(feed.name(), "simulated");
        assert_eq!(state.feed(), "simulated");

        config.feed.kind = FeedKind::WebSocket;
        let (feed, state) = build_feed(&config);
        assert_eq!(feed.name(), "websocket");
        assert_eq!(state.state(), ConnectionState::Disconnected);
    }
}
