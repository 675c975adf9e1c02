//! Scalar normalization.
//!
//! Attribute values and body text arrive as raw strings and are classified
//! into typed values: booleans, numbers, dates, media timecodes, ISO-8601
//! durations and normal-play-time ranges. Anything unrecognized stays a
//! string. Keys fold to lowercase so lookups are case-insensitive.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::value::Value;

lazy_static! {
    static ref CALENDAR_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIMECODE: Regex = Regex::new(r"^(\d+):([0-5]\d):([0-5]\d(?:\.\d+)?)$").unwrap();
    static ref DURATION: Regex = Regex::new(
        r"(?i)^P(?:(\d+(?:\.\d+)?)Y)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)W)?(?:(\d+(?:\.\d+)?)D)?(?:T(?:(\d+(?:\.\d+)?)H)?(?:(\d+(?:\.\d+)?)M)?(?:(\d+(?:\.\d+)?)S)?)?$"
    )
    .unwrap();
    static ref NPT_RANGE: Regex =
        Regex::new(r"^(?:npt[=:])?([^-\s]+)-([^-\s]*)$").unwrap();
}

/// Case-fold a tag or attribute name for lookup.
pub fn fold_key(name: &str) -> String {
    name.to_lowercase()
}

/// Classify a raw string into a typed value.
///
/// The ladder runs in a fixed order; the first rung that accepts the input
/// wins. An empty string stays an empty string.
pub fn classify(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Str(String::new());
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Some(n) = parse_number(raw) {
        return Value::Number(n);
    }
    if let Some(d) = parse_date(raw) {
        return Value::Date(d);
    }
    if let Some(secs) = parse_timecode(raw) {
        return Value::Number(secs);
    }
    if let Some(secs) = parse_duration(raw) {
        return Value::Number(secs);
    }
    if let Some((start, end)) = parse_npt_range(raw) {
        return Value::Array(vec![
            Value::Number(start),
            end.map(Value::Number).unwrap_or(Value::Null),
        ]);
    }
    Value::Str(raw.to_string())
}

/// Strict numeric parse: must start with a digit, sign or dot, and parse
/// fully. Spelled-out specials ("NaN", "inf") stay strings.
fn parse_number(raw: &str) -> Option<f64> {
    let first = *raw.as_bytes().first()?;
    if !(first.is_ascii_digit() || first == b'+' || first == b'-' || first == b'.') {
        return None;
    }
    if raw
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E')
    {
        return None;
    }
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// RFC 3339 timestamps, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if CALENDAR_DATE.is_match(raw) {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight).fixed_offset());
    }
    None
}

/// Media timecode `H+:MM:SS[.frac]` as seconds.
pub(crate) fn parse_timecode(raw: &str) -> Option<f64> {
    let caps = TIMECODE.captures(raw)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// ISO-8601 duration as seconds. Calendar components use the fixed factors
/// 365d/year, 30d/month, 7d/week.
pub(crate) fn parse_duration(raw: &str) -> Option<f64> {
    let caps = DURATION.captures(raw)?;
    // A lone "P" (or "PT") matches the regex but carries no components.
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return None;
    }
    let part = |i: usize| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0)
    };
    let days = part(1) * 365.0 + part(2) * 30.0 + part(3) * 7.0 + part(4);
    Some(days * 86400.0 + part(5) * 3600.0 + part(6) * 60.0 + part(7))
}

/// Normal-play-time range `[npt=]start-end`. Components are plain seconds
/// or timecodes; an open end yields `None`.
pub(crate) fn parse_npt_range(raw: &str) -> Option<(f64, Option<f64>)> {
    let caps = NPT_RANGE.captures(raw)?;
    let start = parse_npt_component(&caps[1])?;
    let end_raw = &caps[2];
    if end_raw.is_empty() {
        return Some((start, None));
    }
    let end = parse_npt_component(end_raw)?;
    Some((start, Some(end)))
}

fn parse_npt_component(raw: &str) -> Option<f64> {
    if let Some(secs) = parse_timecode(raw) {
        return Some(secs);
    }
    raw.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Split an identifier into words on separators and case boundaries.
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
        }
        None => String::new(),
    }
}

/// `some-headerName` -> `someHeaderName`.
pub fn camel_case(input: &str) -> String {
    let words = split_words(input);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

/// `some-headerName` -> `SomeHeaderName`.
pub fn pascal_case(input: &str) -> String {
    split_words(input).iter().map(|w| capitalize(w)).collect()
}

/// `someHeaderName` -> `some_header_name`.
pub fn snake_case(input: &str) -> String {
    split_words(input)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}
