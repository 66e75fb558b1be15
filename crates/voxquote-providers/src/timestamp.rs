// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor timestamp decoding. Anything unparseable becomes `None`.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// RFC 3339 string, e.g. `2026-03-01T12:00:00.000Z`.
pub fn from_rfc3339(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unix seconds, as a number or a numeric string. Non-positive values are
/// treated as absent.
pub fn from_unix_secs(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = as_f64(value?)?;
    if secs <= 0.0 || !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Unix milliseconds, as a number or a numeric string. Non-positive values
/// are treated as absent.
pub fn from_unix_millis(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let millis = as_f64(value?)?;
    if millis <= 0.0 || !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis.round() as i64)
}

/// A non-negative number of seconds, as a number or numeric string.
pub fn seconds(value: Option<&Value>) -> Option<f64> {
    as_f64(value?).filter(|s| s.is_finite() && *s >= 0.0)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rfc3339() {
        let dt = from_rfc3339(Some(&json!("2026-03-01T12:00:00Z"))).unwrap();
        assert_eq!(dt.timestamp(), 1_772_366_400);
        let offset = from_rfc3339(Some(&json!("2026-03-01T13:00:00+01:00"))).unwrap();
        assert_eq!(offset, dt);
        assert!(from_rfc3339(Some(&json!("yesterday"))).is_none());
        assert!(from_rfc3339(Some(&json!(12))).is_none());
        assert!(from_rfc3339(None).is_none());
    }

    #[test]
    fn unix_units() {
        let secs = from_unix_secs(Some(&json!(1_772_366_400))).unwrap();
        let millis = from_unix_millis(Some(&json!(1_772_366_400_000_i64))).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(from_unix_secs(Some(&json!("1772366400"))), Some(secs));
        assert_eq!(
            from_unix_secs(Some(&json!(1_772_366_400.5)))
                .unwrap()
                .timestamp_subsec_millis(),
            500
        );
        assert!(from_unix_secs(Some(&json!(0))).is_none());
        assert!(from_unix_millis(Some(&json!(-5))).is_none());
        assert!(from_unix_millis(Some(&json!(null))).is_none());
    }

    #[test]
    fn durations() {
        assert_eq!(seconds(Some(&json!(12.5))), Some(12.5));
        assert_eq!(seconds(Some(&json!("90"))), Some(90.0));
        assert_eq!(seconds(Some(&json!(-1))), None);
    }
}
