//! Table Snapshots
//!
//! Immutable, point-in-time projections of the row store handed to the
//! presentation layer. A snapshot is never mutated after creation; a newer
//! one replaces it wholesale.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::domain::change::Direction;
use crate::domain::row::{Field, FieldValues, RowKey};

/// Read-only projection of one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    /// Row key.
    pub key: RowKey,
    /// Current value per field.
    pub values: FieldValues,
    /// Active highlight per field. Fields without a highlight are omitted.
    pub highlights: BTreeMap<Field, Direction>,
    /// Row-level highlight: the direction of the first highlighted field in
    /// canonical field order.
    pub highlight: Direction,
    /// Source timestamp of the most recent update (epoch seconds), if sent.
    pub timestamp: Option<i64>,
}

impl RowView {
    /// Build a row view, deriving the row-level highlight from field state.
    #[must_use]
    pub fn new(
        key: RowKey,
        values: FieldValues,
        highlights: BTreeMap<Field, Direction>,
        timestamp: Option<i64>,
    ) -> Self {
        let highlight = highlights
            .values()
            .copied()
            .find(|d| d.is_highlighted())
            .unwrap_or_default();

        Self {
            key,
            values,
            highlights,
            highlight,
            timestamp,
        }
    }

    /// Current value of a field.
    #[must_use]
    pub fn value(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Highlight state of a field.
    #[must_use]
    pub fn field_highlight(&self, field: Field) -> Direction {
        self.highlights.get(&field).copied().unwrap_or_default()
    }
}

/// Immutable table snapshot produced by one render tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    rendered_at: Option<Instant>,
    rows: Vec<RowView>,
}

impl Snapshot {
    /// The empty snapshot published before the first render.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            generation: 0,
            rendered_at: None,
            rows: Vec::new(),
        }
    }

    /// Create a snapshot for a render tick.
    #[must_use]
    pub const fn new(generation: u64, rendered_at: Instant, rows: Vec<RowView>) -> Self {
        Self {
            generation,
            rendered_at: Some(rendered_at),
            rows,
        }
    }

    /// Render generation; strictly increases with each produced snapshot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Time of the render tick that produced this snapshot.
    #[must_use]
    pub const fn rendered_at(&self) -> Option<Instant> {
        self.rendered_at
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    /// Find a row by key.
    #[must_use]
    pub fn row(&self, key: &str) -> Option<&RowView> {
        self.rows.iter().find(|r| r.key.as_str() == key)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the snapshot has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
