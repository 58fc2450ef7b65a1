//! Row Types
//!
//! Keys, tracked numeric fields, and partial field updates for table rows.
//!
//! A row is identified by a [`RowKey`] (ticker symbol or security id) and
//! carries a sparse mapping from [`Field`] to its latest numeric value.
//! Updates arrive as [`FieldUpdate`]s which may carry any subset of fields;
//! fields missing from an update leave the row's value untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// =============================================================================
// Row Key
// =============================================================================

/// Unique identifier for a tracked row (ticker symbol, CUSIP, ...).
///
/// Cheap to clone; the string is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(Arc<str>);

impl RowKey {
    /// Create a new row key.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RowKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl AsRef<str> for RowKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Tracked Fields
// =============================================================================

/// Numeric column tracked per row.
///
/// Declaration order is the canonical column order; it decides which field
/// wins when a single row-level highlight is projected from per-field state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Last traded price.
    Price,
    /// Traded volume.
    Volume,
    /// Percentage movement since the session open.
    Movement,
    /// Session open.
    Open,
    /// Session high.
    High,
    /// Session low.
    Low,
    /// Session close.
    Close,
    /// Best bid.
    Bid,
    /// Best ask.
    Ask,
}

impl Field {
    /// All tracked fields in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Price,
            Self::Volume,
            Self::Movement,
            Self::Open,
            Self::High,
            Self::Low,
            Self::Close,
            Self::Bid,
            Self::Ask,
        ]
    }

    /// Wire/column name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Movement => "movement",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }

    /// Look up a field by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current values of a row, keyed by field.
pub type FieldValues = BTreeMap<Field, f64>;

// =============================================================================
// Field Update
// =============================================================================

/// A partial set of field values carried by one upsert.
///
/// Only defined values are stored: a field that is absent here is left
/// unchanged on the row. Zero is a real value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    values: FieldValues,
    timestamp: Option<i64>,
}

impl FieldUpdate {
    /// Create an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for a field value.
    ///
    /// Non-finite values are dropped.
    #[must_use]
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Builder-style setter for an optional field value.
    #[must_use]
    pub fn with_opt(mut self, field: Field, value: Option<f64>) -> Self {
        if let Some(value) = value {
            self.set(field, value);
        }
        self
    }

    /// Builder-style setter for the source timestamp (epoch seconds).
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set a field value. Non-finite values are ignored.
    pub fn set(&mut self, field: Field, value: f64) {
        if value.is_finite() {
            self.values.insert(field, value);
        }
    }

    /// Set the source timestamp.
    pub const fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
    }

    /// Value for a field, if the update carries it.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Iterate defined `(field, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    /// Source timestamp carried by the update.
    #[must_use]
    pub const fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Whether the update carries no field values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of defined field values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for field in Field::all() {
            assert_eq!(Field::from_name(field.as_str()), Some(*field));
        }
        assert_eq!(Field::from_name("timestamp"), None);
        assert_eq!(Field::from_name("PRICE"), None);
    }

    #[test]
    fn field_order_puts_price_first() {
        assert_eq!(Field::all()[0], Field::Price);
        assert!(Field::Price < Field::Volume);
        assert!(Field::Close < Field::Bid);
    }

    #[test]
    fn update_drops_non_finite_values() {
        let update = FieldUpdate::new()
            .with(Field::Price, f64::NAN)
            .with(Field::Volume, f64::INFINITY)
            .with(Field::Movement, 0.0);

        assert_eq!(update.len(), 1);
        assert_eq!(update.get(Field::Movement), Some(0.0));
        assert_eq!(update.get(Field::Price), None);
    }

    #[test]
    fn update_with_opt_skips_none() {
        let update = FieldUpdate::new()
            .with_opt(Field::Price, None)
            .with_opt(Field::Volume, Some(10.0));

        assert_eq!(update.iter().collect::<Vec<_>>(), vec![(Field::Volume, 10.0)]);
    }

    #[test]
    fn row_key_display_and_eq() {
        let a = RowKey::new("DIS");
        let b: RowKey = "DIS".into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "DIS");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"DIS\"");
    }
}
