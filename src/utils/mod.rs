use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's calendar date in UTC, `YYYY-MM-DD`.
pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn new_report_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deterministic id for a record recovered without one.
///
/// The same item at the same position of the same source always maps to the
/// same id, so rescanning a slot or reimporting a file does not duplicate it.
pub fn stable_report_id(origin: &str, position: usize, item: &Value) -> String {
    let seed = format!("{}\u{1f}{}\u{1f}{}", origin, position, item);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

/// Numeric value of a loosely typed JSON field. Anything that does not parse
/// to a finite number is 0.
pub fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_decimal(s),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

/// Parses `12000`, ` 12,000 ` or `0.068`. Commas are thousands separators.
pub fn parse_decimal(value: &str) -> f64 {
    let cleaned = value.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Loose JSON truthiness: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Date formats seen in older exports that do not carry an ISO date.
/// `%B` also reads abbreviated English month names.
const LOOSE_DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%Y년 %m월 %d일",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%a %b %d %Y",
];

pub fn parse_loose_date(value: &str) -> Option<NaiveDate> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in LOOSE_DATE_FORMATS.iter() {
        if let Ok((date, rest)) = NaiveDate::parse_and_remainder(raw, fmt) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('T') {
                return Some(date);
            }
        }
    }

    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Calendar date (UTC) of an epoch-millisecond timestamp.
pub fn date_from_millis(millis: f64) -> Option<NaiveDate> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
