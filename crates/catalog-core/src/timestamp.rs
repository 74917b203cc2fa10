//! # Timestamp Normalization
//!
//! Every timestamp that enters the catalog (API payloads, SQLite rows, config
//! values) passes through this module.
//!
//! ## Why Fixed-Width UTC?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LAST-WRITE-WINS ON STRINGS                                             │
//! │                                                                         │
//! │  "2024-01-02T00:00:00Z"        vs "2024-01-01T23:00:00-02:00"           │
//! │   lexicographically smaller?      but chronologically EARLIER           │
//! │                                                                         │
//! │  Boundary rule:                                                         │
//! │    any ISO-8601 input ──► parse_utc ──► DateTime<Utc> (millis)          │
//! │    DateTime<Utc>      ──► format_utc ──► "YYYY-MM-DDTHH:MM:SS.mmmZ"    │
//! │                                                                         │
//! │  With a single zone and a single width, string order and time order    │
//! │  are the same thing, so the SQLite TEXT columns sort correctly too.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Precision is clamped to milliseconds, which is what the API sends and
//! what `format_utc` can represent. A value written and read back compares
//! equal to the original.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};

use crate::error::ValidationError;

/// Storage and wire format: always 24 characters.
pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time, truncated to millisecond precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp in the fixed-width UTC form.
///
/// ## Example
/// ```rust
/// use catalog_core::timestamp::{format_utc, parse_utc};
///
/// let t = parse_utc("2024-01-01T10:30:00+02:00").unwrap();
/// assert_eq!(format_utc(&t), "2024-01-01T08:30:00.000Z");
/// ```
pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 with any offset, and offset-less date-times
/// (`2024-01-01T00:00:00`, `2024-01-01 00:00:00.123`), which are taken to be
/// UTC already. Sub-millisecond digits are dropped.
pub fn parse_utc(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).trunc_subsecs(3));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Ok(Utc.from_utc_datetime(&naive).trunc_subsecs(3));
        }
    }

    Err(ValidationError::invalid_format(
        "timestamp",
        format!("'{}' is not an ISO-8601 date-time", raw),
    ))
}

/// Milliseconds since the Unix epoch, as used in the `since` query parameter.
#[inline]
pub fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Serde adapter that writes [`format_utc`] and reads through [`parse_utc`].
///
/// ```rust,ignore
/// #[serde(with = "catalog_core::timestamp::serde_utc")]
/// updated_at: DateTime<Utc>,
/// ```
pub mod serde_utc {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_utc(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_utc(&raw).map_err(de::Error::custom)
    }

    /// Same adapter for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match ts {
                Some(ts) => serializer.serialize_some(&super::super::format_utc(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::super::parse_utc(&raw)
                    .map(Some)
                    .map_err(de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
