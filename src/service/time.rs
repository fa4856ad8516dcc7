//! FILETIME conversion

use chrono::{DateTime, Utc};

/// FILETIME ticks between 1601-01-01 and the Unix epoch
pub const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

/// FILETIME ticks per second (100 ns resolution)
pub const FILETIME_TICKS_PER_SECOND: u64 = 10_000_000;

/// Format used for the readable request time
pub const READABLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z (UTC%z)";

/// Converts request FILETIMEs for logging and storage
pub trait TimeConverter: Send + Sync {
    /// Calendar time for a FILETIME tick count, if representable
    fn convert_filetime(&self, ticks: u64) -> Option<DateTime<Utc>>;
}

/// Converts to UTC without localization
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcTimeConverter;

impl TimeConverter for UtcTimeConverter {
    fn convert_filetime(&self, ticks: u64) -> Option<DateTime<Utc>> {
        filetime_to_datetime(ticks)
    }
}

/// Convert FILETIME ticks to UTC
#[must_use]
pub fn filetime_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    let since_unix = i128::from(ticks) - i128::from(FILETIME_UNIX_OFFSET);
    let per_second = i128::from(FILETIME_TICKS_PER_SECOND);
    let secs = i64::try_from(since_unix.div_euclid(per_second)).ok()?;
    let nanos = u32::try_from(since_unix.rem_euclid(per_second) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// Readable form stored next to each client record
#[must_use]
pub fn readable(time: &DateTime<Utc>) -> String {
    time.format(READABLE_FORMAT).to_string()
}
