//! Board Engine
//!
//! The single writer of reconciliation state. One task owns the row store,
//! the highlight timers and the render scheduler, and serializes every
//! mutation through one `select!` loop:
//!
//! ```text
//!   FeedSink ──mpsc──►┐
//!                      │   ┌──────────────┐      watch       ┌───────────┐
//!   DelayQueue ───────►├──►│ BoardEngine  │───Arc<Snapshot>─►│ BoardView │
//!                      │   └──────────────┘                  └───────────┘
//!   interval(16ms) ───►┘
//! ```
//!
//! Branch priority is shutdown, highlight expiry, render tick, feed event.
//! Expiries and renders therefore keep their cadence under bursty input, and
//! a snapshot reflects exactly the events applied before its tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::scheduler::RenderScheduler;
use super::subscription::Subscription;
use super::timers::{HighlightKey, HighlightTimers};
use super::view::BoardView;
use crate::application::ports::{FeedEvent, FeedSink};
use crate::domain::search::{SearchQuery, SearchSettings};
use crate::domain::snapshot::Snapshot;
use crate::domain::store::{RowStore, UpsertOutcome};
use crate::infrastructure::metrics::{self, EventKind};

// =============================================================================
// Settings
// =============================================================================

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Render tick interval.
    pub render_interval: Duration,
    /// How long a field stays highlighted after its last change.
    pub highlight_duration: Duration,
    /// Capacity of the feed event channel.
    pub event_capacity: usize,
    /// Search normalization.
    pub search: SearchSettings,
    /// Node URI of the subscription.
    pub node: String,
    /// Lane of the subscription.
    pub lane: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            render_interval: Duration::from_millis(16),
            highlight_duration: Duration::from_millis(2_000),
            event_capacity: 4_096,
            search: SearchSettings::default(),
            node: "/symbols".to_string(),
            lane: "stocks".to_string(),
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable control and observation handle for a running engine.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    snapshots: watch::Receiver<Arc<Snapshot>>,
    search: Arc<watch::Sender<SearchQuery>>,
    search_settings: SearchSettings,
    subscription: Subscription,
    shutdown: CancellationToken,
}

impl BoardHandle {
    /// A new presentation view over snapshots and the search string.
    #[must_use]
    pub fn view(&self) -> BoardView {
        BoardView::new(self.snapshots.clone(), self.search.subscribe())
    }

    /// Normalize and publish a new search string.
    ///
    /// Views are only notified if the normalized query changed.
    pub fn set_search(&self, raw: &str) -> SearchQuery {
        let query = SearchQuery::new(raw, &self.search_settings);
        self.search.send_if_modified(|current| {
            if *current == query {
                return false;
            }
            current.clone_from(&query);
            true
        });
        query
    }

    /// Current search query.
    #[must_use]
    pub fn search(&self) -> SearchQuery {
        self.search.borrow().clone()
    }

    /// Search normalization settings.
    #[must_use]
    pub const fn search_settings(&self) -> &SearchSettings {
        &self.search_settings
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// The feed subscription.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Close the subscription and stop the engine.
    pub fn shutdown(&self) {
        self.subscription.close();
        self.shutdown.cancel();
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Owns and mutates all reconciliation state.
#[derive(Debug)]
pub struct BoardEngine {
    store: RowStore,
    timers: HighlightTimers,
    scheduler: RenderScheduler,
    events: mpsc::Receiver<FeedEvent>,
    subscription: Subscription,
    render_interval: Duration,
    shutdown: CancellationToken,
}

impl BoardEngine {
    /// Create an engine with its handle and the sink a feed writes to.
    #[must_use]
    pub fn new(settings: EngineSettings) -> (Self, BoardHandle, FeedSink) {
        let (tx, events) = mpsc::channel(settings.event_capacity.max(1));
        let subscription = Subscription::new(settings.node, settings.lane);
        let scheduler = RenderScheduler::new();
        let (search, _) = watch::channel(SearchQuery::all());
        let shutdown = CancellationToken::new();

        let handle = BoardHandle {
            snapshots: scheduler.subscribe(),
            search: Arc::new(search),
            search_settings: settings.search,
            subscription: subscription.clone(),
            shutdown: shutdown.clone(),
        };
        let sink = FeedSink::new(tx, subscription.clone());

        let engine = Self {
            store: RowStore::new(),
            timers: HighlightTimers::new(settings.highlight_duration),
            scheduler,
            events,
            subscription,
            render_interval: settings.render_interval,
            shutdown,
        };

        (engine, handle, sink)
    }

    /// Run until shutdown is requested.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut feed_open = true;

        tracing::info!(
            node = %self.subscription.node(),
            lane = %self.subscription.lane(),
            render_interval = ?self.render_interval,
            highlight = ?self.timers.duration(),
            "Board engine started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(expired) = self.timers.next_expired(), if !self.timers.is_empty() => {
                    self.expire(&expired);
                }

                _ = ticker.tick() => self.render(),

                event = self.events.recv(), if feed_open => match event {
                    Some(event) => self.apply(event),
                    None => {
                        feed_open = false;
                        tracing::debug!("Feed channel closed");
                    }
                },
            }
        }

        self.subscription.close();
        tracing::info!(
            generation = self.scheduler.generation(),
            rows = self.store.len(),
            "Board engine stopped"
        );
    }

    fn apply(&mut self, event: FeedEvent) {
        if self.subscription.is_closed() {
            metrics::record_feed_event(EventKind::Ignored);
            return;
        }

        match event {
            FeedEvent::Upsert { key, update } => {
                metrics::record_feed_event(EventKind::Upsert);
                let received_at = Instant::now().into_std();
                let outcome = self.store.upsert(&key, &update, received_at, &mut self.timers);

                match outcome {
                    UpsertOutcome::Created => {
                        tracing::debug!(key = %key, fields = update.len(), "Row created");
                        metrics::set_rows(self.store.len());
                    }
                    UpsertOutcome::Updated { changed } => {
                        for (field, direction) in changed {
                            tracing::trace!(
                                key = %key,
                                %field,
                                direction = direction.as_str(),
                                baseline = ?self.store.last_displayed(&key, field),
                                "Highlight"
                            );
                            metrics::record_highlight_started(direction);
                        }
                    }
                    UpsertOutcome::Unchanged => {}
                }
            }
            FeedEvent::Remove { key } => {
                metrics::record_feed_event(EventKind::Remove);
                if self.store.remove(&key, &mut self.timers) {
                    tracing::debug!(key = %key, "Row removed");
                    metrics::set_rows(self.store.len());
                } else {
                    tracing::debug!(key = %key, "Remove for unknown row ignored");
                }
            }
        }
    }

    fn expire(&mut self, expired: &HighlightKey) {
        if self.store.clear_highlight(&expired.row, expired.field) {
            metrics::record_highlight_expired();
        }
    }

    fn render(&mut self) {
        let now = Instant::now().into_std();
        if let Some(snapshot) = self.scheduler.tick(&mut self.store, now) {
            tracing::debug!(
                generation = snapshot.generation(),
                rows = snapshot.len(),
                pending_highlights = self.timers.pending(),
                "Snapshot published"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
