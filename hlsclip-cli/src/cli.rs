use std::path::PathBuf;

use clap::Parser;
use hls_clip::{AudioCodec, Timestamp, VariantPolicy, VideoCodec};

/// Cut a time window out of an HLS (m3u8) stream.
#[derive(Parser, Debug, Clone)]
#[command(name = "hlsclip", version, about, long_about = None)]
pub struct Args {
    /// URL of the m3u8 playlist (media or master)
    #[arg(short = 'u', long)]
    pub url: String,

    /// Start time in format hh:mm:ss[.fff]
    #[arg(short = 's', long = "start", visible_alias = "start-time")]
    pub start: Timestamp,

    /// End time in format hh:mm:ss[.fff]
    #[arg(short = 'e', long = "end", visible_alias = "end-time")]
    pub end: Timestamp,

    /// Path of the trimmed m3u8 playlist to write
    #[arg(short = 'o', long = "output", visible_alias = "output-file")]
    pub output: PathBuf,

    /// Convert the trimmed playlist into a single video file with ffmpeg
    #[arg(short = 'c', long)]
    pub convert: bool,

    /// Converted file path [default: output with an .mp4 extension]
    #[arg(long, requires = "convert")]
    pub convert_output: Option<PathBuf>,

    /// Video codec used when converting
    #[arg(long, value_enum, requires = "convert")]
    pub video_codec: Option<VideoCodec>,

    /// Audio codec used when converting
    #[arg(long, value_enum, requires = "convert")]
    pub audio_codec: Option<AudioCodec>,

    /// Refuse to overwrite an existing converted file
    #[arg(long, requires = "convert")]
    pub no_overwrite: bool,

    /// Path to the ffmpeg binary
    #[arg(long = "ffmpeg", env = "FFMPEG_PATH")]
    pub ffmpeg_path: Option<String>,

    /// Variant to use for master playlists: highest, lowest or a bandwidth in bits per second
    #[arg(long)]
    pub variant: Option<VariantPolicy>,

    /// Playlist request timeout in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// User agent for playlist requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Extra request header as KEY=VALUE or "KEY: VALUE" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Proxy URL for playlist requests
    #[arg(long, conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Ignore system proxy settings
    #[arg(long)]
    pub no_proxy: bool,

    /// Configuration file [default: <config dir>/hlsclip/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
