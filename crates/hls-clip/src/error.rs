use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("invalid timestamp `{input}`: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    #[error("invalid interval: start {start} must be before end {end}")]
    InvalidInterval { start: String, end: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} while fetching {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error(
        "no segments overlap the requested window starting at {start_secs:.3}s (playlist covers {available_secs:.3}s)",
        start_secs = .start.as_secs_f64(),
        available_secs = .available.as_secs_f64()
    )]
    EmptyWindow { start: Duration, available: Duration },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("transcoder `{program}` was not found; install it or set its path")]
    TranscoderNotFound { program: String },

    #[error("transcoder exited with code {code}: {stderr_tail}")]
    TranscoderFailed { code: i32, stderr_tail: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ClipError {
    pub(crate) fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }
}
