//! Column type inference: numeric, datetime or text.

use super::ColumnData;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Share of non-empty values that must parse as dates for a column to
/// become a datetime column.
pub const DATETIME_THRESHOLD: f64 = 0.8;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
];

// Month-first is tried before day-first for slashed dates.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d.%m.%Y"];

/// Parse a single cell as a date/time, trying RFC 3339 first
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if is_missing(raw) {
        return None;
    }
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Cell values read as missing, compared case-insensitively
const MISSING_TOKENS: &[&str] = &[
    "na", "n/a", "nan", "-nan", "null", "none", "#n/a", "#n/a n/a", "#na", "<na>", "1.#ind",
    "-1.#ind", "1.#qnan", "-1.#qnan",
];

/// True for empty cells and the usual spreadsheet/pandas missing markers
pub fn is_missing(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty() || MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

/// Parse a cell as a number, normalising the decimal marker to `.`.
/// Missing markers and anything that parses to NaN give `None`.
pub fn parse_number(raw: &str, decimal: char) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    let s = raw.trim();
    let parsed: Option<f64> = if decimal == '.' {
        s.parse().ok()
    } else {
        s.replace(decimal, ".").parse().ok()
    };
    parsed.filter(|v| !v.is_nan())
}

/// Classify raw cells into numeric, datetime or text column data.
///
/// Cells for which [`is_missing`] holds don't count towards any kind and
/// become `None`. Numeric wins when every non-empty cell is a number. Otherwise the column
/// becomes datetime when at least [`DATETIME_THRESHOLD`] of its non-empty
/// cells parse as dates (cells that don't become missing). Everything else,
/// including a column with no values at all, stays text.
pub fn classify(raw: Vec<String>, decimal: char) -> ColumnData {
    let non_empty = raw.iter().filter(|c| !is_missing(c)).count();
    if non_empty == 0 {
        return ColumnData::Text(raw.into_iter().map(|_| None).collect());
    }

    let numbers: Vec<Option<f64>> = raw.iter().map(|c| parse_number(c, decimal)).collect();
    let numeric_ok = numbers.iter().filter(|n| n.is_some()).count();
    if numeric_ok == non_empty {
        return ColumnData::Numeric(numbers);
    }

    let dates: Vec<Option<NaiveDateTime>> = raw.iter().map(|c| parse_datetime(c)).collect();
    let dates_ok = dates.iter().filter(|d| d.is_some()).count();
    if dates_ok as f64 >= DATETIME_THRESHOLD * non_empty as f64 - 1e-9 {
        return ColumnData::DateTime(dates);
    }

    ColumnData::Text(
        raw.into_iter()
            .map(|c| if is_missing(&c) { None } else { Some(c) })
            .collect(),
    )
}
