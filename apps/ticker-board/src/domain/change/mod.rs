//! Change Classification
//!
//! Decides whether a field moved up, down, or not at all relative to the
//! value that was last shown to the user.

use serde::{Deserialize, Serialize};

/// Highlight direction for a field or row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// No change indicator.
    #[default]
    None,
    /// Value went up.
    Rising,
    /// Value went down.
    Falling,
}

impl Direction {
    /// Whether this direction carries a visible highlight.
    #[must_use]
    pub const fn is_highlighted(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Label used in metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
        }
    }
}

/// Classify a change from `baseline` to `updated`.
///
/// Returns [`Direction::None`] when either side is missing, when either
/// side is not a number, or when the values are equal.
#[must_use]
pub fn classify(baseline: Option<f64>, updated: Option<f64>) -> Direction {
    let (Some(baseline), Some(updated)) = (baseline, updated) else {
        return Direction::None;
    };

    match updated.partial_cmp(&baseline) {
        Some(std::cmp::Ordering::Greater) => Direction::Rising,
        Some(std::cmp::Ordering::Less) => Direction::Falling,
        Some(std::cmp::Ordering::Equal) | None => Direction::None,
    }
}

// =============================================================================
// Tests
// =============================================================================
