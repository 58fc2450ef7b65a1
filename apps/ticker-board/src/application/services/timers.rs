//! Highlight Timer Registry
//!
//! One expiry per `(row, field)` at most, backed by a
//! [`DelayQueue`](tokio_util::time::DelayQueue). Scheduling an already
//! pending pair restarts its timer instead of adding a second one, so every
//! highlight resets exactly once after the last change.
//!
//! The registry is owned by the board engine and polled from its select
//! loop; it never runs callbacks on its own.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use tokio_util::time::{DelayQueue, delay_queue};

use crate::domain::row::{Field, RowKey};
use crate::domain::store::HighlightScheduler;

/// Identifies a pending highlight expiry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HighlightKey {
    /// Row the highlight belongs to.
    pub row: RowKey,
    /// Highlighted field.
    pub field: Field,
}

impl HighlightKey {
    fn new(row: &RowKey, field: Field) -> Self {
        Self {
            row: row.clone(),
            field,
        }
    }
}

/// Registry of pending highlight expiries.
#[derive(Debug)]
pub struct HighlightTimers {
    queue: DelayQueue<HighlightKey>,
    pending: HashMap<HighlightKey, delay_queue::Key>,
    duration: Duration,
}

impl HighlightTimers {
    /// Create a registry whose timers fire `duration` after scheduling.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            queue: DelayQueue::new(),
            pending: HashMap::new(),
            duration,
        }
    }

    /// Highlight duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of pending expiries.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether an expiry is pending for `(row, field)`.
    #[must_use]
    pub fn is_pending(&self, row: &RowKey, field: Field) -> bool {
        self.pending.contains_key(&HighlightKey::new(row, field))
    }

    /// Wait for the next expiry.
    ///
    /// Resolves to `None` immediately when nothing is pending; callers
    /// should guard on [`HighlightTimers::is_empty`] before awaiting.
    /// Cancel safe: an expiry is only taken out of the registry when this
    /// future returns it.
    pub async fn next_expired(&mut self) -> Option<HighlightKey> {
        let expired = poll_fn(|cx| self.queue.poll_expired(cx)).await?;
        let key = expired.into_inner();
        self.pending.remove(&key);
        Some(key)
    }
}

impl HighlightScheduler for HighlightTimers {
    fn schedule(&mut self, row: &RowKey, field: Field) {
        let key = HighlightKey::new(row, field);

        if let Some(handle) = self.pending.get(&key) {
            self.queue.reset(handle, self.duration);
            return;
        }

        let handle = self.queue.insert(key.clone(), self.duration);
        self.pending.insert(key, handle);
    }

    fn cancel(&mut self, row: &RowKey, field: Field) {
        if let Some(handle) = self.pending.remove(&HighlightKey::new(row, field)) {
            self.queue.try_remove(&handle);
        }
    }

    fn cancel_all(&mut self, row: &RowKey) {
        let queue = &mut self.queue;
        self.pending.retain(|key, handle| {
            if key.row == *row {
                queue.try_remove(handle);
                false
            } else {
                true
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use tokio::time::{advance, timeout};

    use super::*;

    const DURATION: Duration = Duration::from_millis(2_000);

    #[tokio::test(start_paused = true)]
    async fn rescheduling_keeps_one_pending_expiry() {
        let mut timers = HighlightTimers::new(DURATION);
        let dis = RowKey::new("DIS");

        timers.schedule(&dis, Field::Price);
        advance(Duration::from_millis(1_500)).await;
        timers.schedule(&dis, Field::Price);

        assert_eq!(timers.pending(), 1);

        // The first schedule would have fired here.
        advance(Duration::from_millis(600)).await;
        assert!(
            timeout(Duration::ZERO, timers.next_expired()).await.is_err(),
            "restarted timer fired early"
        );

        advance(Duration::from_millis(1_400)).await;
        let expired = timers.next_expired().await.unwrap();
        assert_eq!(expired, HighlightKey::new(&dis, Field::Price));
        assert!(timers.is_empty());
        assert_eq!(timers.next_expired().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn fields_expire_independently() {
        let mut timers = HighlightTimers::new(DURATION);
        let dis = RowKey::new("DIS");

        timers.schedule(&dis, Field::Price);
        advance(Duration::from_millis(500)).await;
        timers.schedule(&dis, Field::Volume);

        assert_eq!(timers.next_expired().await.unwrap().field, Field::Price);
        assert!(timers.is_pending(&dis, Field::Volume));
        assert_eq!(timers.next_expired().await.unwrap().field, Field::Volume);
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let mut timers = HighlightTimers::new(DURATION);
        let dis = RowKey::new("DIS");

        timers.schedule(&dis, Field::Price);
        timers.cancel(&dis, Field::Price);
        timers.cancel(&dis, Field::Price);
        timers.cancel(&RowKey::new("NONE"), Field::Ask);

        assert!(timers.is_empty());
        advance(DURATION * 2).await;
        assert_eq!(timers.next_expired().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_only_touches_one_row() {
        let mut timers = HighlightTimers::new(DURATION);
        let aapl = RowKey::new("AAPL");
        let dis = RowKey::new("DIS");

        timers.schedule(&aapl, Field::Price);
        timers.schedule(&aapl, Field::High);
        timers.schedule(&dis, Field::Price);

        timers.cancel_all(&aapl);

        assert_eq!(timers.pending(), 1);
        assert!(!timers.is_pending(&aapl, Field::Price));
        let expired = timers.next_expired().await.unwrap();
        assert_eq!(expired.row, dis);
        assert_eq!(timers.next_expired().await, None);
    }
}
