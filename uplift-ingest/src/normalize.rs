//! Value normalizers
//!
//! Pure conversions from raw staged text into typed values. Every function
//! tolerates blank or garbled input by returning `None` instead of
//! erroring, so resolvers can treat "missing" and "unparseable" uniformly.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Treat `None` or all-whitespace strings as a canonical null, otherwise
/// return the trimmed value.
pub fn to_null_if_blank(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Two-digit years below 50 are read as 2000s, the rest as 1900s.
fn apply_century_rule(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    let yy = dt.year().rem_euclid(100);
    let full = if yy < 50 { 2000 + yy } else { 1900 + yy };
    dt.with_year(full)
}

/// Parse a datetime, trying formats in order:
/// `YYYY-MM-DD HH:MM:SS`, `M/D/YY H:MM` (century rule), RFC 3339,
/// `YYYY-MM-DDTHH:MM:SS`, and finally a bare date at midnight.
/// First successful parse wins; all failures yield `None`.
pub fn parse_date_time(value: Option<&str>) -> Option<NaiveDateTime> {
    let v = to_null_if_blank(value)?;

    if let Ok(dt) = NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(v, "%m/%d/%y %H:%M") {
        return apply_century_rule(dt);
    }

    // Generic ISO-8601 fallbacks. Wall-clock time is kept as written; any
    // offset in the input is not applied.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(v) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}

/// Parse a value that should conceptually be a date, optionally carrying a
/// time component that is discarded.
pub fn parse_date_only(value: Option<&str>) -> Option<NaiveDate> {
    let v = to_null_if_blank(value)?;

    if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        return Some(d);
    }

    if let Ok(d) = NaiveDate::parse_from_str(v, "%m/%d/%y") {
        let dt = d.and_hms_opt(0, 0, 0)?;
        return apply_century_rule(dt).map(|dt| dt.date());
    }

    // Full datetime forms, date part taken
    parse_date_time(Some(v)).map(|dt| dt.date())
}

/// Normalize a timestamp into the canonical `YYYY-MM-DD HH:MM:SS` string
/// without shifting the clock. Values no format can parse pass through
/// trimmed, so the storage layer can attempt its own interpretation.
pub fn to_timestamp_literal(value: Option<&str>) -> Option<String> {
    let v = to_null_if_blank(value)?;

    match parse_date_time(Some(v)) {
        Some(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => Some(v.to_string()),
    }
}

/// Date-only canonical literal (`YYYY-MM-DD`), or `None` if unparseable.
pub fn to_date_literal(value: Option<&str>) -> Option<String> {
    parse_date_only(value).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Safe integer parsing: blank or non-numeric input becomes `None`.
pub fn parse_int_or_null(value: Option<&str>) -> Option<i64> {
    to_null_if_blank(value)?.parse::<i64>().ok()
}

/// Safe float parsing: blank or non-numeric input becomes `None`.
pub fn parse_float_or_null(value: Option<&str>) -> Option<f64> {
    to_null_if_blank(value)?
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Normalize truthy/falsey tokens into booleans; unrecognized tokens are
/// `None` rather than an error.
pub fn parse_boolean(value: Option<&str>) -> Option<bool> {
    let v = to_null_if_blank(value)?;
    match v.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Normalize NPS bucket labels into the fixed Title-cased set used by the
/// reporting schema.
pub fn normalize_nps_bucket(value: Option<&str>) -> Option<&'static str> {
    let v = to_null_if_blank(value)?;
    match v.to_lowercase().as_str() {
        "promoter" => Some("Promoter"),
        "passive" => Some("Passive"),
        "detractor" => Some("Detractor"),
        _ => None,
    }
}

/// Strip all non-digits from phone numbers; an empty result is `None`.
pub fn normalize_phone(value: Option<&str>) -> Option<String> {
    let v = to_null_if_blank(value)?;
    let digits: String = v.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
