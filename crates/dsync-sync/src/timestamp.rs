//! Newer-wins timestamp comparison.
//!
//! Remote and local modification times are reduced to six calendar fields
//! (year through second) and compared field by field. Sub-second precision
//! is dropped on both sides.

use std::fmt;

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use dsync_core::config::ClockMode;

use crate::SyncError;

/// Which side holds the newer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Remote,
    Local,
    Equal,
}

impl Verdict {
    /// The verdict seen from the other side.
    pub fn flipped(self) -> Self {
        match self {
            Self::Remote => Self::Local,
            Self::Local => Self::Remote,
            Self::Equal => Self::Equal,
        }
    }
}

/// A timestamp truncated to whole seconds, as calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
}

impl Timestamp {
    pub fn new(year: i64, month: i64, day: i64, hour: i64, minute: i64, second: i64) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS[.fraction][Z]`.
    ///
    /// Only the shape is checked: each of the six fields must be an
    /// integer. Calendar validity is not.
    ///
    /// # Errors
    /// Returns `InvalidTimestamp` if the text does not have six integer fields.
    pub fn parse_remote(text: &str) -> Result<Self, SyncError> {
        let invalid = || SyncError::InvalidTimestamp(text.to_string());

        let (date, time) = text.trim().split_once('T').ok_or_else(invalid)?;
        let time = time.strip_suffix('Z').unwrap_or(time);
        let time = match time.split_once('.') {
            Some((whole, fraction)) => {
                if !fraction.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                whole
            }
            None => time,
        };

        let date_fields = parse_fields(date, '-').ok_or_else(invalid)?;
        let time_fields = parse_fields(time, ':').ok_or_else(invalid)?;

        Ok(Self::new(
            date_fields[0],
            date_fields[1],
            date_fields[2],
            time_fields[0],
            time_fields[1],
            time_fields[2],
        ))
    }

    /// Calendar fields of a local modification time under the given clock.
    pub fn from_local(time: DateTime<Utc>, mode: ClockMode) -> Self {
        match mode {
            ClockMode::Utc => Self::from_datetime(&time),
            ClockMode::LocalWallClock => Self::from_datetime(&time.with_timezone(&Local)),
        }
    }

    fn from_datetime<Tz: chrono::TimeZone>(time: &DateTime<Tz>) -> Self {
        Self::new(
            i64::from(time.year()),
            i64::from(time.month()),
            i64::from(time.day()),
            i64::from(time.hour()),
            i64::from(time.minute()),
            i64::from(time.second()),
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Split `text` into exactly three integer fields.
fn parse_fields(text: &str, separator: char) -> Option<[i64; 3]> {
    let mut fields = [0i64; 3];
    let mut parts = text.split(separator);
    for field in &mut fields {
        let part = parts.next()?;
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        *field = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(fields)
}

/// Compares a remote timestamp string with a local modification time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampComparator {
    mode: ClockMode,
}

impl TimestampComparator {
    pub fn new(mode: ClockMode) -> Self {
        Self { mode }
    }

    /// Decide which side is newer.
    ///
    /// # Errors
    /// Returns `InvalidTimestamp` if the remote timestamp cannot be parsed.
    pub fn compare(&self, remote: &str, local: DateTime<Utc>) -> Result<Verdict, SyncError> {
        let remote = Timestamp::parse_remote(remote)?;
        let local = Timestamp::from_local(local, self.mode);
        Ok(Self::compare_fields(&remote, &local))
    }

    /// Field-wise comparison: the first differing field decides.
    pub fn compare_fields(remote: &Timestamp, local: &Timestamp) -> Verdict {
        // Derived Ord compares fields in declaration order.
        match remote.cmp(local) {
            std::cmp::Ordering::Greater => Verdict::Remote,
            std::cmp::Ordering::Less => Verdict::Local,
            std::cmp::Ordering::Equal => Verdict::Equal,
        }
    }
}
