//! `HH:MM:SS[.fff]` timestamps used to address a position inside a playlist.

use std::{fmt, str::FromStr, time::Duration};

use crate::ClipError;

/// A non-negative offset from the beginning of a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Parses `HH:MM:SS` with an optional fractional second part.
    ///
    /// Hours are unbounded, minutes and seconds must stay below 60 and the
    /// fraction may carry at most nanosecond precision.
    pub fn parse(input: &str) -> Result<Self, ClipError> {
        let invalid = |reason: &str| ClipError::InvalidTimestamp {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("timestamp is empty"));
        }

        let fields: Vec<&str> = trimmed.split(':').collect();
        let [hours, minutes, seconds] = fields.as_slice() else {
            return Err(invalid("expected HH:MM:SS"));
        };

        let (whole_seconds, fraction) = match seconds.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (*seconds, None),
        };

        let hours = parse_field(hours).ok_or_else(|| invalid("hours must be a number"))?;
        let minutes = parse_field(minutes).ok_or_else(|| invalid("minutes must be a number"))?;
        let whole_seconds =
            parse_field(whole_seconds).ok_or_else(|| invalid("seconds must be a number"))?;

        if minutes >= 60 {
            return Err(invalid("minutes must be less than 60"));
        }
        if whole_seconds >= 60 {
            return Err(invalid("seconds must be less than 60"));
        }

        let nanos = match fraction {
            None => 0,
            Some(fraction) => {
                if fraction.is_empty() || fraction.len() > 9 {
                    return Err(invalid("fraction must have between 1 and 9 digits"));
                }
                let digits =
                    parse_field(fraction).ok_or_else(|| invalid("fraction must be a number"))?;
                // scale to nanoseconds: "5" -> 500_000_000
                (digits * 10u64.pow(9 - fraction.len() as u32)) as u32
            }
        };

        let secs = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + whole_seconds))
            .ok_or_else(|| invalid("timestamp is out of range"))?;

        Ok(Self(Duration::new(secs, nanos)))
    }
}

/// Accepts ASCII digits only, so signs and whitespace inside a field are rejected.
fn parse_field(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

impl FromStr for Timestamp {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Duration> for Timestamp {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        let millis = self.0.subsec_millis();
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            total / 3600,
            (total % 3600) / 60,
            total % 60,
            millis
        )
    }
}
