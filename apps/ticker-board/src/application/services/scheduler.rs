//! Render Scheduler
//!
//! Turns the dirty row store into immutable snapshots at a bounded rate.
//! The engine calls [`RenderScheduler::tick`] from its fixed interval; a
//! tick on a clean store does nothing, so the render rate never exceeds
//! the interval regardless of how fast the feed is.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::domain::snapshot::Snapshot;
use crate::domain::store::RowStore;
use crate::infrastructure::metrics;

/// Publishes snapshots of the row store on a watch channel.
#[derive(Debug)]
pub struct RenderScheduler {
    generation: u64,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl RenderScheduler {
    /// Create a scheduler publishing the empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::empty()));
        Self { generation: 0, tx }
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Number of snapshots rendered so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Render if the store changed since the previous tick.
    ///
    /// Clears the dirty flag, advances the store's render epoch to `now`,
    /// and publishes a fresh snapshot. Returns `None` when the store was
    /// clean.
    pub fn tick(&mut self, store: &mut RowStore, now: Instant) -> Option<Arc<Snapshot>> {
        if !store.take_dirty() {
            return None;
        }

        let started = Instant::now();
        store.mark_rendered(now);
        self.generation += 1;

        let snapshot = Arc::new(Snapshot::new(
            self.generation,
            now,
            store.snapshot_values(),
        ));
        self.tx.send_replace(Arc::clone(&snapshot));

        metrics::record_render(started.elapsed());
        tracing::trace!(
            generation = self.generation,
            rows = snapshot.len(),
            "Rendered snapshot"
        );

        Some(snapshot)
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::change::Direction;
    use crate::domain::row::{Field, FieldUpdate, RowKey};
    use crate::domain::store::HighlightScheduler;

    struct NoTimers;

    impl HighlightScheduler for NoTimers {
        fn schedule(&mut self, _: &RowKey, _: Field) {}
        fn cancel(&mut self, _: &RowKey, _: Field) {}
        fn cancel_all(&mut self, _: &RowKey) {}
    }

    fn price(p: f64) -> FieldUpdate {
        FieldUpdate::new().with(Field::Price, p)
    }

    #[test]
    fn clean_store_does_not_render() {
        let mut scheduler = RenderScheduler::new();
        let mut store = RowStore::new();

        assert!(scheduler.tick(&mut store, Instant::now()).is_none());
        assert_eq!(scheduler.generation(), 0);
        assert!(scheduler.latest().is_empty());
    }

    #[test]
    fn renders_once_per_batch_of_changes() {
        let mut scheduler = RenderScheduler::new();
        let mut store = RowStore::new();
        let t0 = Instant::now();
        let key = RowKey::new("DIS");

        store.upsert(&key, &price(100.0), t0, &mut NoTimers);
        store.upsert(&key, &price(105.0), t0, &mut NoTimers);

        let snapshot = scheduler.tick(&mut store, t0).unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.row("DIS").unwrap().value(Field::Price), Some(105.0));
        assert_eq!(snapshot.row("DIS").unwrap().highlight, Direction::Rising);

        let later = t0 + Duration::from_millis(16);
        assert!(scheduler.tick(&mut store, later).is_none());
        assert_eq!(scheduler.generation(), 1);
        assert_eq!(store.last_rendered_at(), Some(t0));
    }

    #[test]
    fn subscribers_see_latest_snapshot() {
        let mut scheduler = RenderScheduler::new();
        let mut rx = scheduler.subscribe();
        let mut store = RowStore::new();
        let t0 = Instant::now();

        store.upsert(&RowKey::new("AAPL"), &price(1.0), t0, &mut NoTimers);
        scheduler.tick(&mut store, t0);

        assert!(rx.has_changed().unwrap());
        let snapshot = Arc::clone(&rx.borrow_and_update());
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.rendered_at(), Some(t0));
        assert!(snapshot.row("AAPL").is_some());
    }
}
