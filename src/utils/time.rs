use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Accepts RFC 3339 or a browser `datetime-local` value (taken as UTC).
pub fn parse_interview_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::Validation(format!(
        "Invalid interview datetime: {:?}",
        raw
    )))
}

pub fn interview_date(dt: DateTime<Utc>) -> String {
    dt.format("%A, %B %-d, %Y").to_string()
}

pub fn interview_time(dt: DateTime<Utc>) -> String {
    dt.format("%H:%M UTC").to_string()
}
