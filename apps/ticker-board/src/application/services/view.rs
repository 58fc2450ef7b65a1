//! Presentation Boundary
//!
//! A [`BoardView`] combines the latest snapshot with the current search
//! query. Presentation code awaits [`BoardView::changed`] and renders the
//! returned frame; it never sees the row store.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::row::RowKey;
use crate::domain::search::SearchQuery;
use crate::domain::snapshot::{RowView, Snapshot};

/// Filtered rows ready for display.
#[derive(Debug, Clone)]
pub struct BoardFrame {
    /// Generation of the snapshot the rows come from.
    pub generation: u64,
    /// Normalized search text applied.
    pub query: String,
    /// Total rows in the snapshot before filtering.
    pub total_rows: usize,
    /// Matching rows in snapshot order.
    pub rows: Vec<RowView>,
}

impl BoardFrame {
    fn build(snapshot: &Snapshot, query: &SearchQuery) -> Self {
        Self {
            generation: snapshot.generation(),
            query: query.as_str().to_string(),
            total_rows: snapshot.len(),
            rows: query.filter(snapshot),
        }
    }

    /// Keys of the displayed rows.
    #[must_use]
    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }
}

/// Subscriber to snapshot and search changes.
#[derive(Debug, Clone)]
pub struct BoardView {
    snapshots: watch::Receiver<Arc<Snapshot>>,
    search: watch::Receiver<SearchQuery>,
}

impl BoardView {
    /// Combine a snapshot receiver and a search receiver.
    #[must_use]
    pub const fn new(
        snapshots: watch::Receiver<Arc<Snapshot>>,
        search: watch::Receiver<SearchQuery>,
    ) -> Self {
        Self { snapshots, search }
    }

    /// The current frame. Marks both inputs as seen.
    pub fn current(&mut self) -> BoardFrame {
        let snapshot = Arc::clone(&self.snapshots.borrow_and_update());
        let query = self.search.borrow_and_update().clone();
        BoardFrame::build(&snapshot, &query)
    }

    /// Wait for a new snapshot or search string and return the new frame.
    ///
    /// Returns `None` once the engine or the board handle is gone.
    pub async fn changed(&mut self) -> Option<BoardFrame> {
        tokio::select! {
            res = self.snapshots.changed() => res.ok()?,
            res = self.search.changed() => res.ok()?,
        }
        Some(self.current())
    }
}
