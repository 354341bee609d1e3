//! Aggregation windows.
//!
//! A window is the half-open interval `[start, end)` covering one UTC hour or
//! one UTC calendar day. Buckets are keyed by the window start.

use std::fmt;

use chrono::{DateTime, NaiveTime, TimeDelta, Timelike, Utc};

// ---

/// Bucket size of a rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    /// Length of one window.
    pub fn span(self) -> TimeDelta {
        match self {
            Granularity::Hourly => TimeDelta::hours(1),
            Granularity::Daily => TimeDelta::days(1),
        }
    }

    /// Start of the window containing `ts`.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        // ---
        let midnight = ts.date_naive().and_time(NaiveTime::MIN).and_utc();
        match self {
            Granularity::Hourly => midnight + TimeDelta::hours(i64::from(ts.hour())),
            Granularity::Daily => midnight,
        }
    }

    /// The window containing `ts`.
    pub fn window_containing(self, ts: DateTime<Utc>) -> Window {
        // ---
        let start = self.truncate(ts);
        Window {
            start,
            end: start + self.span(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Hourly => write!(f, "hourly"),
            Granularity::Daily => write!(f, "daily"),
        }
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// True when `start <= ts < end`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
