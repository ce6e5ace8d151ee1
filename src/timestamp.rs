//! Timestamp realignment for replayed log records.
//!
//! A record keeps its minute, second and microsecond, but moves to the date
//! and hour of a reference "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Default field carrying the event time
pub const DEFAULT_FIELD: &str = "@timestamp";

/// Offset-aware formats, tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Naive formats, interpreted as UTC wall-clock time
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp is not a string: {0}")]
    NotAString(String),

    #[error("invalid isoformat string: '{value}'")]
    Unparseable { value: String },

    #[error("offset of {0} minutes is out of range")]
    OffsetOutOfRange(i64),
}

/// Outcome of realigning a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Realignment {
    /// Record has no timestamp field (or is not an object)
    Absent,
    /// Timestamp parsed and moved to the base date/hour
    Realigned(String),
    /// Timestamp unusable, replaced by the base time
    Fallback { original: String, reason: String },
}

/// Current UTC time shifted by `offset_minutes`
pub fn base_time(offset_minutes: i64) -> Result<NaiveDateTime, TimestampError> {
    shift(Utc::now().naive_utc(), offset_minutes)
}

/// `now` moved by `offset_minutes`, failing instead of overflowing
pub fn shift(now: NaiveDateTime, offset_minutes: i64) -> Result<NaiveDateTime, TimestampError> {
    TimeDelta::try_minutes(offset_minutes)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(TimestampError::OffsetOutOfRange(offset_minutes))
}

/// Parse an ISO-8601 timestamp into its wall-clock components.
///
/// Values with an explicit offset keep their local reading in that offset;
/// they are not converted to UTC.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let unparseable = || TimestampError::Unparseable {
        value: raw.to_string(),
    };

    if raw.trim() != raw {
        return Err(unparseable());
    }
    let parsed = parse_components(raw).ok_or_else(unparseable)?;

    // leap seconds arrive as nanosecond overflow; ISO parsing rejects second 60
    if parsed.nanosecond() >= 1_000_000_000 {
        return Err(unparseable());
    }
    Ok(parsed)
}

fn parse_components(value: &str) -> Option<NaiveDateTime> {
    let normalized = match value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        Some(stripped) => format!("{}+00:00", stripped),
        None => value.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.naive_local());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(dt.naive_local());
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Microseconds within the second, ignoring leap-second overflow
fn micros(dt: &NaiveDateTime) -> u32 {
    (dt.nanosecond() % 1_000_000_000) / 1_000
}

/// Take date and hour from `base`, minute/second/microsecond from `original`
pub fn realign(base: NaiveDateTime, original: NaiveDateTime) -> NaiveDateTime {
    base.date()
        .and_hms_micro_opt(
            base.hour(),
            original.minute(),
            original.second(),
            micros(&original),
        )
        .unwrap_or(base)
}

/// Render as `YYYY-MM-DDTHH:MM:SS[.ffffff]Z`
pub fn format_timestamp(dt: NaiveDateTime) -> String {
    let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let us = micros(&dt);
    if us != 0 {
        out.push_str(&format!(".{:06}", us));
    }
    out.push('Z');
    out
}

/// Rewrites one timestamp field of JSON records against a fixed base time
#[derive(Debug, Clone)]
pub struct Realigner {
    base: NaiveDateTime,
    field: String,
}

impl Realigner {
    pub fn new(base: NaiveDateTime, field: impl Into<String>) -> Self {
        Self {
            base,
            field: field.into(),
        }
    }

    pub fn base(&self) -> NaiveDateTime {
        self.base
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn realign_value(&self, value: &Value) -> Result<String, TimestampError> {
        let raw = value
            .as_str()
            .ok_or_else(|| TimestampError::NotAString(value.to_string()))?;
        let parsed = parse_timestamp(raw)?;
        Ok(format_timestamp(realign(self.base, parsed)))
    }

    /// Apply to a record in place
    pub fn apply(&self, record: &mut Value) -> Realignment {
        let Some(slot) = record
            .as_object_mut()
            .and_then(|obj| obj.get_mut(&self.field))
        else {
            return Realignment::Absent;
        };

        match self.realign_value(slot) {
            Ok(updated) => {
                *slot = Value::String(updated.clone());
                Realignment::Realigned(updated)
            }
            Err(e) => {
                let original = match &*slot {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                warn!(
                    "Could not parse timestamp '{}', using current time: {}",
                    original, e
                );
                *slot = Value::String(format_timestamp(self.base));
                Realignment::Fallback {
                    original,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_micro_opt(14, 22, 33, 500_000)
            .unwrap()
    }

    #[test]
    fn test_realign_keeps_minute_second_micro() {
        let original = parse_timestamp("2021-03-04T07:05:09.123456Z").unwrap();
        let out = format_timestamp(realign(base(), original));
        assert_eq!(out, "2026-10-18T14:05:09.123456Z");
    }

    #[test]
    fn test_zero_micros_omits_fraction() {
        let original = parse_timestamp("2021-03-04T07:05:09Z").unwrap();
        let out = format_timestamp(realign(base(), original));
        assert_eq!(out, "2026-10-18T14:05:09Z");
    }

    #[test]
    fn test_offset_uses_local_components() {
        let parsed = parse_timestamp("2021-03-04T07:45:10+05:30").unwrap();
        assert_eq!(parsed.hour(), 7);
        assert_eq!(parsed.minute(), 45);
        assert_eq!(parsed.second(), 10);
    }

    #[test]
    fn test_nanoseconds_truncated() {
        let original = parse_timestamp("2021-03-04T07:05:09.123456789Z").unwrap();
        let out = format_timestamp(realign(base(), original));
        assert_eq!(out, "2026-10-18T14:05:09.123456Z");
    }

    #[test]
    fn test_naive_and_date_only_forms() {
        let naive = parse_timestamp("2021-03-04 07:05:09").unwrap();
        assert_eq!((naive.minute(), naive.second()), (5, 9));

        let date = parse_timestamp("2021-03-04").unwrap();
        assert_eq!((date.hour(), date.minute(), date.second()), (0, 0, 0));
    }

    #[test]
    fn test_leap_second_rejected() {
        assert!(matches!(
            parse_timestamp("2016-12-31T23:59:60Z"),
            Err(TimestampError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_surrounding_whitespace_rejected() {
        assert!(parse_timestamp(" 2021-03-04T07:05:09Z").is_err());
        assert!(parse_timestamp("2021-03-04T07:05:09Z\t").is_err());

        let r = Realigner::new(base(), DEFAULT_FIELD);
        let mut doc = json!({"@timestamp": "2021-03-04T07:05:09Z "});
        assert!(matches!(r.apply(&mut doc), Realignment::Fallback { .. }));
        assert_eq!(doc["@timestamp"], "2026-10-18T14:22:33.500000Z");
    }

    #[test]
    fn test_shift_moves_date_and_hour() {
        let later = shift(base(), 120).unwrap();
        assert_eq!(format_timestamp(later), "2026-10-18T16:22:33.500000Z");

        let earlier = shift(base(), -15 * 60).unwrap();
        assert_eq!(format_timestamp(earlier), "2026-10-17T23:22:33.500000Z");

        let original = parse_timestamp("2020-01-01T00:07:08Z").unwrap();
        assert_eq!(
            format_timestamp(realign(earlier, original)),
            "2026-10-17T23:07:08Z"
        );
    }

    #[test]
    fn test_shift_overflow_is_error() {
        assert_eq!(
            shift(base(), i64::MAX / 1000),
            Err(TimestampError::OffsetOutOfRange(i64::MAX / 1000))
        );
        assert!(base_time(i64::MIN).is_err());
        assert!(base_time(0).is_ok());
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(TimestampError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_apply_rewrites_only_field() {
        let r = Realigner::new(base(), DEFAULT_FIELD);
        let mut doc = json!({"@timestamp": "2020-01-01T00:59:58Z", "msg": "hello"});
        let outcome = r.apply(&mut doc);
        assert_eq!(
            outcome,
            Realignment::Realigned("2026-10-18T14:59:58Z".to_string())
        );
        assert_eq!(doc["msg"], "hello");
        assert_eq!(doc["@timestamp"], "2026-10-18T14:59:58Z");
    }

    #[test]
    fn test_apply_fallback_on_garbage() {
        let r = Realigner::new(base(), DEFAULT_FIELD);
        let mut doc = json!({"@timestamp": "not a date"});
        assert!(matches!(r.apply(&mut doc), Realignment::Fallback { .. }));
        assert_eq!(doc["@timestamp"], "2026-10-18T14:22:33.500000Z");
    }

    #[test]
    fn test_apply_fallback_on_non_string() {
        let r = Realigner::new(base(), DEFAULT_FIELD);
        let mut doc = json!({"@timestamp": 1700000000});
        assert!(matches!(r.apply(&mut doc), Realignment::Fallback { .. }));
        assert_eq!(doc["@timestamp"], "2026-10-18T14:22:33.500000Z");
    }

    #[test]
    fn test_apply_absent() {
        let r = Realigner::new(base(), DEFAULT_FIELD);
        let mut doc = json!({"ts": "2020-01-01T00:00:00Z"});
        assert_eq!(r.apply(&mut doc), Realignment::Absent);
        let mut arr = json!([1, 2, 3]);
        assert_eq!(r.apply(&mut arr), Realignment::Absent);
    }

    #[test]
    fn test_custom_field() {
        let r = Realigner::new(base(), "event_time");
        let mut doc = json!({"event_time": "2020-01-01T03:10:20Z"});
        r.apply(&mut doc);
        assert_eq!(doc["event_time"], "2026-10-18T14:10:20Z");
    }
}
