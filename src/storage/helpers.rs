//! Shared storage helper functions.
//!
//! Timestamp and date encoding used by the SQL backends. Timestamps are
//! stored as fixed-width UTC RFC3339 strings so that lexicographic order
//! matches chronological order and range filters can compare text.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::Result;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Encode a timestamp for storage.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Decode an optional stored timestamp.
pub fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// Encode a bucket date for storage.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Decode a stored bucket date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw, DATE_FORMAT)?)
}
