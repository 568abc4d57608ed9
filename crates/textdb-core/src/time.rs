//! Timestamp parsing for validity records and queries.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Compact UTC form used in validity documents: `20230501T205951Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{value}' as a timestamp (expected YYYYMMDDTHHMMSSZ or RFC 3339)")]
pub struct TimestampError {
    pub value: String,
}

/// Parse `YYYYMMDDTHHMMSSZ`, falling back to RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimestampError {
            value: value.to_string(),
        })
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Anything a temporal query accepts as its point in time.
pub trait IntoTimestamp {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError>;
}

impl IntoTimestamp for DateTime<Utc> {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError> {
        Ok(self)
    }
}

impl IntoTimestamp for &DateTime<Utc> {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError> {
        Ok(*self)
    }
}

impl IntoTimestamp for &str {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(self)
    }
}

impl IntoTimestamp for String {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(&self)
    }
}

impl IntoTimestamp for &String {
    fn into_timestamp(self) -> Result<DateTime<Utc>, TimestampError> {
        parse_timestamp(self)
    }
}
