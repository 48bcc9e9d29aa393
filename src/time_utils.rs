// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Every timestamp written to the document store goes through
//! [`format_utc_rfc3339`], so stored values have a fixed width and sort
//! lexicographically in chronological order.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Format a UTC timestamp as RFC3339 with millisecond precision and a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time truncated to the precision that is stored.
///
/// Records stamped with this value compare equal to their stored copy.
pub fn utc_now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Parse any RFC3339 timestamp into UTC.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for `DateTime<Utc>` fields stored as fixed-width strings.
pub mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_utc_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC3339 timestamp: {raw}")))
    }
}

/// Same as [`rfc3339`] for optional fields. Use together with `#[serde(default)]`.
pub mod rfc3339_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&super::format_utc_rfc3339(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) => super::parse_utc_rfc3339(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC3339 timestamp: {raw}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_survives_storage_round_trip() {
        let now = utc_now_millis();
        assert_eq!(parse_utc_rfc3339(&format_utc_rfc3339(now)), Some(now));
    }

    #[test]
    fn test_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let fractional = whole + chrono::Duration::microseconds(123_456);

        assert_eq!(format_utc_rfc3339(whole), "2026-01-02T03:04:05.000Z");
        assert_eq!(format_utc_rfc3339(fractional), "2026-01-02T03:04:05.123Z");
        assert!(format_utc_rfc3339(whole) < format_utc_rfc3339(fractional));
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let parsed = parse_utc_rfc3339("2026-01-02T05:04:05+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
        assert!(parse_utc_rfc3339("yesterday").is_none());
    }
}
