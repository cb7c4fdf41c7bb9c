//! Timestamp utilities

use chrono::{DateTime, Local, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format used in extract file names (minute granularity)
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Run stamp for extract file names, in local time
pub fn run_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(RUN_STAMP_FORMAT).to_string()
}

/// Current local run stamp
pub fn local_run_stamp() -> String {
    run_stamp(&Local::now())
}

/// Seconds since the Unix epoch for a file modification time
///
/// Times before the epoch clamp to zero.
pub fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
