//! Daily trading windows and the pure membership test.
//!
//! A schedule is a set of time-of-day intervals; the monitor runs while the
//! current time falls inside at least one of them. Windows are inclusive on
//! both ends. A window whose end precedes its start (midnight spanning) is
//! rejected at construction — supporting it would be an explicit extension,
//! not an accident of the comparison order.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing or validating a time window.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window '{0}' is not of the form 'HH:MM-HH:MM'")]
    Format(String),

    #[error("unparseable time '{0}' (expected HH:MM or HH:MM:SS)")]
    Time(String),

    #[error("window end {end} precedes start {start} (midnight-spanning windows are not supported)")]
    Inverted { start: NaiveTime, end: NaiveTime },
}

/// One daily interval, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    /// Builds a window, rejecting `end < start`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses `"HH:MM-HH:MM"` (seconds optional on either side).
    pub fn parse(s: &str) -> Result<Self, WindowError> {
        let (start_s, end_s) = s
            .split_once('-')
            .ok_or_else(|| WindowError::Format(s.to_string()))?;
        Self::new(parse_time(start_s.trim())?, parse_time(end_s.trim())?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Inclusive membership test for a single window.
    pub fn contains(&self, now: NaiveTime) -> bool {
        now >= self.start && now <= self.end
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = WindowError;

    fn try_from(s: String) -> Result<Self, WindowError> {
        Self::parse(&s)
    }
}

impl From<TimeWindow> for String {
    fn from(w: TimeWindow) -> String {
        format!(
            "{}-{}",
            w.start.format("%H:%M:%S"),
            w.end.format("%H:%M:%S")
        )
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| WindowError::Time(s.to_string()))
}

/// True iff `now` falls within at least one window. Pure, no side effects.
pub fn is_active(now: NaiveTime, windows: &[TimeWindow]) -> bool {
    windows.iter().any(|w| w.contains(now))
}
