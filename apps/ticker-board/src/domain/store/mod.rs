//! Row Store
//!
//! The single mutable table of reconciled rows plus the per-field metadata
//! needed to decide highlight direction against what was last rendered.
//!
//! # Baseline Rule
//!
//! Updates can arrive faster than the table renders. Comparing a new value
//! against the previous *received* value would highlight moves the user
//! never saw, so each field keeps a `last_displayed` baseline instead:
//!
//! - Every render advances the store's render epoch.
//! - When a field is updated and its previous update happened in an earlier
//!   epoch, the previous value was on screen: it becomes the new baseline.
//! - Otherwise the baseline is kept across any number of intra-tick updates.
//!
//! The first value ever seen for a field is its own baseline and never
//! highlights, so a new row never flashes.
//!
//! # Timers
//!
//! The store does not own timers. It drives a [`HighlightScheduler`] so the
//! domain stays free of any async runtime; the application layer plugs in a
//! real timer registry.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::domain::change::{Direction, classify};
use crate::domain::row::{Field, FieldUpdate, FieldValues, RowKey};
use crate::domain::snapshot::RowView;

// =============================================================================
// Highlight Scheduler Port
// =============================================================================

/// Receives highlight timer requests from the store.
///
/// Implementations must keep at most one pending expiry per `(key, field)`:
/// scheduling again replaces the pending one. Cancelling something that is
/// not pending is a no-op.
pub trait HighlightScheduler {
    /// Start or restart the expiry timer for a field highlight.
    fn schedule(&mut self, key: &RowKey, field: Field);

    /// Cancel the pending expiry for a field, if any.
    fn cancel(&mut self, key: &RowKey, field: Field);

    /// Cancel every pending expiry for a row.
    fn cancel_all(&mut self, key: &RowKey);
}

// =============================================================================
// Metadata
// =============================================================================

/// Per-row, per-field reconciliation metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMetadata {
    /// Value shown by the most recent render that included this field.
    pub last_displayed: Option<f64>,
    /// Time of the render that established `last_displayed`.
    pub last_displayed_at: Option<Instant>,
    /// When this field last received a value.
    pub updated_at: Instant,
    /// Render epoch in which this field last received a value.
    pub updated_epoch: u64,
    /// Current highlight. A timer is pending exactly while this is not `None`.
    pub highlight: Direction,
}

impl FieldMetadata {
    const fn first(value: f64, received_at: Instant, epoch: u64) -> Self {
        Self {
            last_displayed: Some(value),
            last_displayed_at: None,
            updated_at: received_at,
            updated_epoch: epoch,
            highlight: Direction::None,
        }
    }
}

#[derive(Debug)]
struct RowEntry {
    seq: u64,
    values: FieldValues,
    meta: BTreeMap<Field, FieldMetadata>,
    timestamp: Option<i64>,
}

impl RowEntry {
    fn create(seq: u64, update: &FieldUpdate, received_at: Instant, epoch: u64) -> Self {
        let values: FieldValues = update.iter().collect();
        let meta = update
            .iter()
            .map(|(field, value)| (field, FieldMetadata::first(value, received_at, epoch)))
            .collect();

        Self {
            seq,
            values,
            meta,
            timestamp: update.timestamp(),
        }
    }

    fn view(&self, key: &RowKey) -> RowView {
        let highlights = self
            .meta
            .iter()
            .filter(|(_, m)| m.highlight.is_highlighted())
            .map(|(f, m)| (*f, m.highlight))
            .collect();

        RowView::new(key.clone(), self.values.clone(), highlights, self.timestamp)
    }
}

// =============================================================================
// Upsert Outcome
// =============================================================================

/// Result of applying one upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row did not exist and was created without highlights.
    Created,
    /// The row existed and the update carried at least one field.
    Updated {
        /// Fields that started (or restarted) a highlight, with direction.
        changed: Vec<(Field, Direction)>,
    },
    /// The row existed and the update carried no usable field.
    ///
    /// A new timestamp alone still marks the store dirty.
    Unchanged,
}

// =============================================================================
// Row Store
// =============================================================================

/// Mapping from row key to the latest reconciled row and its metadata.
///
/// Not observable: the render scheduler polls [`RowStore::take_dirty`] and
/// reads [`RowStore::snapshot_values`].
#[derive(Debug, Default)]
pub struct RowStore {
    rows: HashMap<RowKey, RowEntry>,
    next_seq: u64,
    epoch: u64,
    last_rendered_at: Option<Instant>,
    dirty: bool,
}

impl RowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a row.
    ///
    /// Each defined field is classified against its last displayed value,
    /// applied, and its highlight timer is scheduled, restarted, or
    /// cancelled through `scheduler`. Fields absent from `update` keep their
    /// current value.
    pub fn upsert<S>(
        &mut self,
        key: &RowKey,
        update: &FieldUpdate,
        received_at: Instant,
        scheduler: &mut S,
    ) -> UpsertOutcome
    where
        S: HighlightScheduler + ?Sized,
    {
        let epoch = self.epoch;
        let rendered_at = self.last_rendered_at;

        if !self.rows.contains_key(key) {
            let entry = RowEntry::create(self.next_seq, update, received_at, epoch);
            self.next_seq += 1;
            self.rows.insert(key.clone(), entry);
            self.dirty = true;
            return UpsertOutcome::Created;
        }

        let Some(entry) = self.rows.get_mut(key) else {
            return UpsertOutcome::Unchanged;
        };

        if let Some(ts) = update.timestamp()
            && entry.timestamp != Some(ts)
        {
            entry.timestamp = Some(ts);
            self.dirty = true;
        }

        if update.is_empty() {
            return UpsertOutcome::Unchanged;
        }

        let mut changed = Vec::new();

        for (field, value) in update.iter() {
            let previous = entry.values.insert(field, value);

            let meta = match entry.meta.entry(field) {
                Entry::Vacant(slot) => {
                    slot.insert(FieldMetadata::first(value, received_at, epoch));
                    continue;
                }
                Entry::Occupied(slot) => slot.into_mut(),
            };

            // A render happened since this field last changed: the previous
            // value is what the user saw.
            if meta.updated_epoch < epoch {
                meta.last_displayed = previous;
                meta.last_displayed_at = rendered_at;
            }

            let direction = classify(meta.last_displayed, Some(value));
            meta.updated_at = received_at;
            meta.updated_epoch = epoch;

            if direction.is_highlighted() {
                meta.highlight = direction;
                scheduler.schedule(key, field);
                changed.push((field, direction));
            } else if meta.highlight.is_highlighted() {
                meta.highlight = Direction::None;
                scheduler.cancel(key, field);
            }
        }

        self.dirty = true;
        UpsertOutcome::Updated { changed }
    }

    /// Remove a row, cancelling its pending highlight timers.
    ///
    /// Returns `false` (and changes nothing) if the key is unknown.
    pub fn remove<S>(&mut self, key: &RowKey, scheduler: &mut S) -> bool
    where
        S: HighlightScheduler + ?Sized,
    {
        if self.rows.remove(key).is_none() {
            return false;
        }

        scheduler.cancel_all(key);
        self.dirty = true;
        true
    }

    /// Reset a field's highlight after its timer fired.
    ///
    /// Idempotent: returns `false` when the row, field, or highlight is
    /// already gone. Marks the store dirty only when something changed so
    /// the next render tick shows the reset.
    pub fn clear_highlight(&mut self, key: &RowKey, field: Field) -> bool {
        let Some(meta) = self
            .rows
            .get_mut(key)
            .and_then(|entry| entry.meta.get_mut(&field))
        else {
            return false;
        };

        if !meta.highlight.is_highlighted() {
            return false;
        }

        meta.highlight = Direction::None;
        self.dirty = true;
        true
    }

    /// Read and clear the dirty flag.
    pub const fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Whether the store changed since the last [`RowStore::take_dirty`].
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that a render tick published the current state at `now`.
    pub const fn mark_rendered(&mut self, now: Instant) {
        self.epoch += 1;
        self.last_rendered_at = Some(now);
    }

    /// Time of the last render tick, if any.
    #[must_use]
    pub const fn last_rendered_at(&self) -> Option<Instant> {
        self.last_rendered_at
    }

    /// Read-only projection of every row in insertion order.
    #[must_use]
    pub fn snapshot_values(&self) -> Vec<RowView> {
        let mut entries: Vec<_> = self.rows.iter().collect();
        entries.sort_unstable_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(key, entry)| entry.view(key))
            .collect()
    }

    /// Whether a row exists.
    #[must_use]
    pub fn contains(&self, key: &RowKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Current value of a field.
    #[must_use]
    pub fn value(&self, key: &RowKey, field: Field) -> Option<f64> {
        self.rows.get(key)?.values.get(&field).copied()
    }

    /// Current highlight of a field (`None` for unknown rows or fields).
    #[must_use]
    pub fn highlight(&self, key: &RowKey, field: Field) -> Direction {
        self.field_metadata(key, field)
            .map_or(Direction::None, |m| m.highlight)
    }

    /// Value the field's latest change was classified against.
    #[must_use]
    pub fn last_displayed(&self, key: &RowKey, field: Field) -> Option<f64> {
        self.field_metadata(key, field)?.last_displayed
    }

    /// Metadata for a field.
    #[must_use]
    pub fn field_metadata(&self, key: &RowKey, field: Field) -> Option<&FieldMetadata> {
        self.rows.get(key)?.meta.get(&field)
    }
}

// =============================================================================
// Tests
// =============================================================================
