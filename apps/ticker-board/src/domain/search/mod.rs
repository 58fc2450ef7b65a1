//! Search Filter
//!
//! Case-insensitive key matching over an already rendered snapshot. Search
//! never touches the row store or its dirty tracking.

use serde::{Deserialize, Serialize};

use crate::domain::snapshot::{RowView, Snapshot};

/// Case the query is folded to before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFold {
    /// Fold to upper case (symbols are conventionally upper case).
    #[default]
    Upper,
    /// Fold to lower case.
    Lower,
}

impl CaseFold {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upper" => Some(Self::Upper),
            "lower" => Some(Self::Lower),
            _ => None,
        }
    }

    /// Configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }

    fn apply(self, s: &str) -> String {
        match self {
            Self::Upper => s.to_uppercase(),
            Self::Lower => s.to_lowercase(),
        }
    }
}

/// Where in the key the query must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Anywhere in the key.
    #[default]
    Substring,
    /// At the start of the key.
    Prefix,
}

impl MatchMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "substring" => Some(Self::Substring),
            "prefix" => Some(Self::Prefix),
            _ => None,
        }
    }

    /// Configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Prefix => "prefix",
        }
    }
}

/// How raw search input is normalized and matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Maximum number of characters kept from the input.
    pub max_len: usize,
    /// Case folding applied to the input.
    pub case_fold: CaseFold,
    /// Match mode.
    pub mode: MatchMode,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_len: 4,
            case_fold: CaseFold::default(),
            mode: MatchMode::default(),
        }
    }
}

/// A normalized search query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    text: String,
    mode: MatchMode,
}

impl SearchQuery {
    /// Normalize raw user input: trim, truncate to `max_len` characters,
    /// then case-fold.
    #[must_use]
    pub fn new(raw: &str, settings: &SearchSettings) -> Self {
        let truncated: String = raw.trim().chars().take(settings.max_len).collect();
        Self {
            text: settings.case_fold.apply(&truncated),
            mode: settings.mode,
        }
    }

    /// The query that matches every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Normalized query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the query is empty (matches every row).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether a row key matches, ignoring case.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        if self.text.is_empty() {
            return true;
        }

        let needle = self.text.to_lowercase();
        let haystack = key.to_lowercase();
        match self.mode {
            MatchMode::Substring => haystack.contains(&needle),
            MatchMode::Prefix => haystack.starts_with(&needle),
        }
    }

    /// Rows of `snapshot` whose key matches, in snapshot order, with their
    /// highlight state untouched.
    #[must_use]
    pub fn filter(&self, snapshot: &Snapshot) -> Vec<RowView> {
        snapshot
            .rows()
            .iter()
            .filter(|row| self.matches(row.key.as_str()))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Instant;

    use proptest::prelude::*;

    use super::*;
    use crate::domain::change::Direction;
    use crate::domain::row::{Field, FieldValues, RowKey};

    fn row(key: &str, highlight: Option<Direction>) -> RowView {
        let mut highlights = BTreeMap::new();
        if let Some(direction) = highlight {
            highlights.insert(Field::Price, direction);
        }
        RowView::new(RowKey::new(key), FieldValues::new(), highlights, None)
    }

    fn snapshot(keys: &[&str]) -> Snapshot {
        Snapshot::new(1, Instant::now(), keys.iter().map(|k| row(k, None)).collect())
    }

    #[test]
    fn query_is_trimmed_truncated_and_folded() {
        let settings = SearchSettings::default();
        let query = SearchQuery::new("  msftx ", &settings);
        assert_eq!(query.as_str(), "MSFT");

        let lower = SearchSettings {
            case_fold: CaseFold::Lower,
            ..settings
        };
        assert_eq!(SearchQuery::new("DiS", &lower).as_str(), "dis");
    }

    #[test]
    fn empty_query_matches_everything() {
        let snap = snapshot(&["AAPL", "DIS"]);
        assert_eq!(SearchQuery::all().filter(&snap).len(), 2);
        assert_eq!(SearchQuery::new("   ", &SearchSettings::default()).filter(&snap).len(), 2);
    }

    #[test]
    fn substring_and_prefix_modes() {
        let snap = snapshot(&["AAPL", "PLTR", "DIS"]);
        let substring = SearchQuery::new("pl", &SearchSettings::default());
        let prefix = SearchQuery::new(
            "pl",
            &SearchSettings {
                mode: MatchMode::Prefix,
                ..SearchSettings::default()
            },
        );

        let keys = |rows: Vec<RowView>| rows.into_iter().map(|r| r.key.to_string()).collect::<Vec<_>>();
        assert_eq!(keys(substring.filter(&snap)), vec!["AAPL", "PLTR"]);
        assert_eq!(keys(prefix.filter(&snap)), vec!["PLTR"]);
    }

    #[test]
    fn filter_keeps_highlights() {
        let snap = Snapshot::new(
            3,
            Instant::now(),
            vec![row("DIS", Some(Direction::Rising)), row("AAPL", Some(Direction::Falling))],
        );

        let rows = SearchQuery::new("dis", &SearchSettings::default()).filter(&snap);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].highlight, Direction::Rising);
        assert_eq!(rows[0], snap.rows()[0]);
    }

    #[test]
    fn settings_names_parse() {
        assert_eq!(CaseFold::from_str_case_insensitive("LOWER"), Some(CaseFold::Lower));
        assert_eq!(MatchMode::from_str_case_insensitive("Prefix"), Some(MatchMode::Prefix));
        assert_eq!(MatchMode::from_str_case_insensitive("regex"), None);
        assert_eq!(CaseFold::Upper.as_str(), "upper");
    }

    proptest! {
        #[test]
        fn filter_returns_exact_matching_subset(
            keys in proptest::collection::vec("[A-Za-z]{1,5}", 0..20),
            raw in "[A-Za-z]{0,4}",
        ) {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let snap = snapshot(&refs);
            let query = SearchQuery::new(&raw, &SearchSettings::default());

            let filtered = query.filter(&snap);
            let expected: Vec<&str> = refs
                .iter()
                .copied()
                .filter(|k| k.to_lowercase().contains(&raw.to_lowercase()))
                .collect();
            let actual: Vec<&str> = filtered.iter().map(|r| r.key.as_str()).collect();

            prop_assert_eq!(actual, expected);
        }
    }
}
