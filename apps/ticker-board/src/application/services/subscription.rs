//! Feed Subscription Handle
//!
//! Shared, idempotently closable handle for one node/lane subscription.
//! Closing it stops the board from applying further feed events and tells
//! the feed task to unlink and exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Inner {
    node: String,
    lane: String,
    closed: AtomicBool,
    token: CancellationToken,
}

/// Cloneable handle to an open feed subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

impl Subscription {
    /// Open a subscription to `lane` on `node`.
    #[must_use]
    pub fn new(node: impl Into<String>, lane: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                node: node.into(),
                lane: lane.into(),
                closed: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Node URI.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.inner.node
    }

    /// Lane name.
    #[must_use]
    pub fn lane(&self) -> &str {
        &self.inner.lane
    }

    /// Close the subscription.
    ///
    /// Returns `true` for the call that actually closed it; every later
    /// call (from any clone) is a no-op returning `false`.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.inner.token.cancel();
        tracing::debug!(
            node = %self.inner.node,
            lane = %self.inner.lane,
            "Subscription closed"
        );
        true
    }

    /// Whether the subscription has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Wait until the subscription is closed.
    pub async fn closed(&self) {
        self.inner.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[test]
    fn close_is_idempotent_across_clones() {
        let sub = Subscription::new("/symbols", "stocks");
        let other = sub.clone();

        assert!(!sub.is_closed());
        assert!(other.close());
        assert!(!sub.close());
        assert!(!other.close());
        assert!(sub.is_closed());
    }

    #[test]
    fn closed_future_resolves_on_close() {
        let sub = Subscription::new("/symbols", "stocks");
        let mut waiter = task::spawn(sub.closed());

        assert_pending!(waiter.poll());
        sub.close();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn clones_share_node_and_lane() {
        let sub = Subscription::new("/symbols", "stocks");
        let other = sub.clone();

        other.close();
        assert!(sub.is_closed());
        assert_eq!(sub.node(), "/symbols");
        assert_eq!(sub.lane(), "stocks");
    }
}
