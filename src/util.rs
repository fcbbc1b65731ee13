// src/util.rs
use chrono::{DateTime, SecondsFormat, Utc};

/// Parses an ISO-8601 UTC timestamp ("2025-07-17T08:05:03.360677248Z") into
/// nanoseconds since epoch. Pre-1970 or post-2262 values are rejected.
pub fn parse_ts(s: &str) -> Option<u64> {
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    u64::try_from(dt.timestamp_nanos_opt()?).ok()
}

/// Renders epoch nanoseconds in the same nine-digit ISO-8601 form the feed
/// uses.
pub fn format_ts(ns: u64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(ns as i64).to_rfc3339_opts(SecondsFormat::Nanos, true)
}
