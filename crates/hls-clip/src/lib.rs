//! Cut a `[start, end)` window out of an HLS playlist.
//!
//! The crate fetches a media playlist (following a master playlist if needed),
//! keeps the segments that overlap the requested interval, writes them out as a
//! self-contained VOD playlist and optionally hands that playlist to an external
//! transcoder with the matching start offset and duration.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hls_clip::{ClipRequest, Clipper, FfmpegTranscoder, HttpConfig, PlaylistLoader, Timestamp, TranscodeOptions};
//!
//! # async fn run() -> Result<(), hls_clip::ClipError> {
//! let request = ClipRequest::new(
//!     "https://example.com/vod/index.m3u8",
//!     Timestamp::parse("00:01:00")?,
//!     Timestamp::parse("00:02:30")?,
//!     "clip.m3u8",
//! )?
//! .with_transcode(TranscodeOptions::default());
//!
//! let clipper = Clipper::new(
//!     PlaylistLoader::from_config(&HttpConfig::default())?,
//!     Some(Arc::new(FfmpegTranscoder::new())),
//! );
//! let outcome = clipper.run(&request).await?;
//! println!("{} segments", outcome.segments);
//! # Ok(())
//! # }
//! ```

mod clipper;
mod config;
mod error;
mod interval;
mod playlist;
mod timestamp;
mod transcode;
mod window;
mod writer;

pub use clipper::{ClipOutcome, ClipRequest, Clipper};
pub use config::{DEFAULT_USER_AGENT, HttpConfig, ProxyConfig, install_rustls_provider};
pub use error::ClipError;
pub use interval::ClipInterval;
pub use playlist::{PlaylistLoader, ResolvedPlaylist, VariantPolicy};
pub use timestamp::Timestamp;
pub use transcode::{
    AudioCodec, FfmpegTranscoder, TranscodeJob, TranscodeOptions, Transcoder, VideoCodec,
    determine_output_path,
};
pub use window::{SegmentWindow, select_window, total_duration};
pub use writer::{render_playlist, write_playlist};

/// Re-export so callers can inspect [`SegmentWindow::playlist`] without a direct dependency.
pub use m3u8_rs;
