//! Field normalization for heterogeneous, dirty source data
//!
//! Both extractors feed their raw cell values through these functions so
//! the rest of the pipeline only ever sees typed values. Amount parsing
//! fails closed to zero and date parsing fails closed to `None`; a
//! malformed field never aborts a load.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Fixed tolerance for cross-source amount comparison, in currency units.
///
/// Deliberately not configurable so discrepancy flags are deterministic
/// across the codebase.
pub fn mismatch_tolerance() -> BigDecimal {
    BigDecimal::from_str("0.01").expect("tolerance literal parses")
}

/// Canonicalize a raw monetary string into a decimal amount.
///
/// Strips currency symbols and whitespace first. When a `,` is present
/// the source locale applies: `.` is a thousands separator and `,` the
/// decimal separator (`"$1.234,56"` -> 1234.56). A comma-free string is
/// taken as a plain decimal (`"1234.56"` -> 1234.56), which covers
/// sources that hand over already-numeric text.
///
/// Fails closed: anything unparseable yields zero rather than an error.
/// A returned zero therefore means "unknown", not "verified zero".
pub fn normalize_amount(raw: &str) -> BigDecimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if cleaned.is_empty() {
        return BigDecimal::from(0);
    }

    let candidate = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    match BigDecimal::from_str(&candidate) {
        Ok(amount) => amount,
        Err(_) => {
            tracing::debug!(raw, "amount failed to parse, defaulting to zero");
            BigDecimal::from(0)
        }
    }
}

/// Parse a raw date string against the known source formats, in order.
///
/// Order matters because the formats are ambiguous (`2024-05-01` vs
/// `01/05/2024`); ties are broken by list position, not by heuristic.
/// Returns `None` on empty input or total failure.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Timestamp form first, with or without a fractional second.
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    tracing::debug!(raw, "date matched no known format");
    None
}
