//! # Temporal Values
//!
//! Timestamps enter the hash as integer Unix seconds. Sub-second
//! precision is not part of the signed contract, and a timestamp without
//! timezone information is never silently read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CanonicalError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A timestamp as supplied by the caller.
///
/// `Naive` exists so that timezone-less input can be carried to the
/// hasher and rejected there with a distinguishable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampValue {
    /// A timestamp with an explicit UTC offset.
    Zoned(DateTime<FixedOffset>),
    /// A local date-time with no offset. Never hashable.
    Naive(NaiveDateTime),
}

impl TimestampValue {
    /// Parse ISO-8601 text, keeping offset-less input as `Naive`.
    ///
    /// Zoned values are truncated to whole seconds. Text that is not a
    /// date-time at all fails with `InvalidTimestamp`.
    pub fn parse(text: &str) -> Result<Self, CanonicalError> {
        let text = text.trim();
        let zoned = DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z"));
        if let Ok(dt) = zoned {
            return Ok(Self::Zoned(dt.with_nanosecond(0).unwrap_or(dt)));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(Self::Naive)
            .ok_or_else(|| CanonicalError::InvalidTimestamp(text.to_string()))
    }

    /// Unix seconds, truncated toward zero.
    pub fn unix_seconds(&self) -> Result<i64, CanonicalError> {
        match self {
            Self::Zoned(dt) => {
                let secs = dt.timestamp();
                // timestamp() floors; pre-epoch values with a fraction
                // must round toward zero instead.
                if secs < 0 && dt.timestamp_subsec_nanos() > 0 {
                    Ok(secs + 1)
                } else {
                    Ok(secs)
                }
            }
            Self::Naive(naive) => Err(CanonicalError::MissingTimezone(naive.to_string())),
        }
    }
}

impl<Tz: chrono::TimeZone> From<DateTime<Tz>> for TimestampValue {
    fn from(dt: DateTime<Tz>) -> Self {
        Self::Zoned(dt.fixed_offset())
    }
}

impl Serialize for TimestampValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Zoned(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::Naive(naive) => serializer.collect_str(&naive.format(NAIVE_FORMATS[0])),
        }
    }
}

impl<'de> Deserialize<'de> for TimestampValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Parse an ISO-8601 timestamp that carries an explicit offset.
///
/// The result is truncated to whole seconds. Text that parses as a local
/// date-time without an offset fails with `MissingTimezone`.
pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, CanonicalError> {
    match TimestampValue::parse(text)? {
        TimestampValue::Zoned(dt) => Ok(dt),
        TimestampValue::Naive(_) => Err(CanonicalError::MissingTimezone(text.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_with_offset() {
        let dt = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(dt.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_parse_z_suffix_truncates_subseconds() {
        let dt = parse_timestamp("2024-01-01T00:00:00.987Z").unwrap();
        assert_eq!(dt.timestamp(), 1_704_067_200);
        assert_eq!(dt.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_parse_space_separator() {
        let dt = parse_timestamp("2024-01-01 00:00:00+00:00").unwrap();
        assert_eq!(dt.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_parse_without_timezone_rejected() {
        match parse_timestamp("2024-01-01T00:00:00") {
            Err(CanonicalError::MissingTimezone(s)) => assert_eq!(s, "2024-01-01T00:00:00"),
            other => panic!("expected MissingTimezone, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage_is_invalid() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(CanonicalError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_pre_epoch_truncates_toward_zero() {
        let dt = FixedOffset::east_opt(0)
            .unwrap()
            .timestamp_opt(-2, 500_000_000)
            .unwrap();
        // -1.5 seconds truncates to -1
        assert_eq!(TimestampValue::Zoned(dt).unix_seconds().unwrap(), -1);
    }

    #[test]
    fn test_naive_value_rejected() {
        let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(TimestampValue::Naive(naive).unix_seconds().is_err());
    }

    #[test]
    fn test_naive_text_kept_for_hasher() {
        let value: TimestampValue = serde_json::from_str("\"2024-01-01T00:00:00\"").unwrap();
        assert!(matches!(value, TimestampValue::Naive(_)));
        assert!(matches!(
            value.unix_seconds(),
            Err(CanonicalError::MissingTimezone(_))
        ));
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            "\"2024-01-01T00:00:00\""
        );
    }

    #[test]
    fn test_zoned_text_roundtrips() {
        let value: TimestampValue =
            serde_json::from_str("\"2024-01-01T02:00:00.5+02:00\"").unwrap();
        assert_eq!(value.unix_seconds().unwrap(), 1_704_067_200);
        let json = serde_json::to_string(&value).unwrap();
        let back: TimestampValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_garbage_text_fails_deserialize() {
        assert!(serde_json::from_str::<TimestampValue>("\"soon\"").is_err());
    }
}
