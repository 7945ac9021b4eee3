//! Conversions between points in time and the `YYYY-MM-DD HH:MM:SS` text
//! form databases store timestamps in. Storage timestamps are UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{DbError, Result};

/// Canonical storage timestamp layout.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format `instant` (or the current time) as a storage timestamp.
pub fn to_storage_timestamp(instant: Option<DateTime<Utc>>) -> String {
    instant
        .unwrap_or_else(Utc::now)
        .format(STORAGE_FORMAT)
        .to_string()
}

/// Parse a storage timestamp back into a point in time.
///
/// Only the exact zero-padded layout is accepted, so every accepted string
/// formats back to itself.
pub fn to_instant(storage_timestamp: &str) -> Result<DateTime<Utc>> {
    let parse_error = |reason: String| DbError::Parse {
        input: storage_timestamp.to_string(),
        reason,
    };
    let instant = NaiveDateTime::parse_from_str(storage_timestamp, STORAGE_FORMAT)
        .map_err(|e| parse_error(e.to_string()))?
        .and_utc();
    // chrono accepts unpadded fields and runs of whitespace.
    if to_storage_timestamp(Some(instant)) != storage_timestamp {
        return Err(parse_error(
            "expected zero-padded YYYY-MM-DD HH:MM:SS".to_string(),
        ));
    }
    Ok(instant)
}
