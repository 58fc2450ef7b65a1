//! Display Formatting
//!
//! Stateless conversions from field values to the strings shown in the
//! table. Missing values render as [`PLACEHOLDER`]; zero is a real value.

use crate::domain::row::Field;

/// Shown in place of a value the row has never received.
pub const PLACEHOLDER: &str = "--";

/// Format a price with three decimals, dropping a single trailing zero.
///
/// `109.5` renders as `109.50`, `12.125` as `12.125`.
#[must_use]
pub fn format_price(value: f64) -> String {
    let mut result = format!("{value:.3}");
    let bytes = result.as_bytes();
    if result.len() > 4 && result.ends_with('0') && bytes[result.len() - 4] == b'.' {
        result.pop();
    }
    result
}

/// Format an optional price, using the placeholder when absent.
#[must_use]
pub fn format_number(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), format_price)
}

/// Format a dollar amount with thousands separators and two decimals.
#[must_use]
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("{sign}${}.{frac_part}", group_thousands(int_part))
}

/// Format a value as a rounded integer with thousands separators.
#[must_use]
pub fn format_grouped(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());
    format!("{sign}{}", group_thousands(&digits))
}

/// Format percentage points with an explicit sign: `0.073` is `+0.07%`.
#[must_use]
pub fn format_percent(value: f64) -> String {
    format!("{value:+.2}%")
}

/// Format a field value for its column.
#[must_use]
pub fn format_field(field: Field, value: Option<f64>) -> String {
    match field {
        Field::Volume => value.map_or_else(|| PLACEHOLDER.to_string(), format_grouped),
        Field::Movement => value.map_or_else(|| PLACEHOLDER.to_string(), format_percent),
        Field::Price
        | Field::Open
        | Field::High
        | Field::Low
        | Field::Close
        | Field::Bid
        | Field::Ask => format_number(value),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
