//! Cell values plus the text parsing/formatting rules shared by the CSV
//! codec, type conversion and date feature extraction.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::hash::{Hash, Hasher};

/// Tokens read as a missing value (the pandas defaults that matter in practice).
pub const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A", "<NA>",
];

/// A single cell.
///
/// Category cells surface as [`Value::Text`]; the label type lives on the column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

// Number columns never hold NaN, so equality is reflexive.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Missing => {}
            // 0.0 == -0.0 must hash the same
            Value::Number(n) => {
                let n = if *n == 0.0 { 0.0_f64 } else { *n };
                n.to_bits().hash(state);
            }
            Value::Text(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::DateTime(d) => d.hash(state),
        }
    }
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Render the value as text; `None` for missing.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Number(n) => Some(format_number(*n)),
            Value::Text(s) => Some(s.clone()),
            Value::Boolean(b) => Some(format_bool(*b).to_string()),
            Value::DateTime(d) => Some(format_datetime(d, is_midnight(d))),
        }
    }

    /// JSON rendering for previews. Non-finite numbers become strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing => serde_json::Value::Null,
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(format_number(*n))),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(d) => serde_json::Value::String(format_datetime(d, is_midnight(d))),
        }
    }
}

/// Whether a raw field should be read as missing.
pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

/// Parse a number, `None` for missing tokens and unparsable text.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if is_missing_token(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Parse `True`/`False` in any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?$",
    )
    .expect("date pattern is valid")
});

/// Parse an ISO-like date or date-time.
///
/// Accepts `YYYY-MM-DD`, `/` or `.` separators, an optional
/// `HH:MM[:SS[.fraction]]` part, and RFC 3339 strings with an offset
/// (converted to UTC).
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if is_missing_token(s) {
        return None;
    }

    if let Some(caps) = DATE_PATTERN.captures(s) {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?;
        let nanos = caps
            .get(7)
            .map(|m| format!("{:0<9}", m.as_str()))
            .and_then(|f| f.parse::<u32>().ok())
            .unwrap_or(0);
        return date.and_hms_nano_opt(
            num(4).unwrap_or(0),
            num(5).unwrap_or(0),
            num(6).unwrap_or(0),
            nanos,
        );
    }

    DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc())
}

/// Shortest round-trip rendering; integral values print without `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    format!("{}", n)
}

pub fn format_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

pub fn is_midnight(d: &NaiveDateTime) -> bool {
    d.num_seconds_from_midnight() == 0 && d.nanosecond() == 0
}

/// `YYYY-MM-DD` when `date_only`, else `YYYY-MM-DD HH:MM:SS[.fraction]`.
pub fn format_datetime(d: &NaiveDateTime, date_only: bool) -> String {
    if date_only {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}
