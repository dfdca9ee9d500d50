use std::time::Duration;

use crate::{ClipError, Timestamp};

/// A half-open `[start, end)` window into a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipInterval {
    start: Timestamp,
    end: Timestamp,
}

impl ClipInterval {
    /// Creates a new interval, rejecting empty or inverted ranges.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ClipError> {
        if start >= end {
            return Err(ClipError::InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds and validates their ordering.
    pub fn parse(start: &str, end: &str) -> Result<Self, ClipError> {
        Self::new(Timestamp::parse(start)?, Timestamp::parse(end)?)
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end.as_duration() - self.start.as_duration()
    }

    /// Whether a segment spanning `[seg_start, seg_end)` shares any time with this interval.
    pub fn overlaps(&self, seg_start: Duration, seg_end: Duration) -> bool {
        seg_start < self.end.as_duration() && seg_end > self.start.as_duration()
    }
}
