//! Hand-off of a trimmed playlist to an external transcoder.

use std::{
    path::{Component, Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::ClipError;

/// Protocols ffmpeg may open while reading a playlist that points at remote segments.
const PROTOCOL_WHITELIST: &str = "file,http,https,tcp,tls,crypto";

/// Video codec options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum VideoCodec {
    /// Copy video stream without re-encoding.
    #[default]
    Copy,
    /// H.264/AVC codec.
    H264,
    /// H.265/HEVC codec.
    #[serde(alias = "hevc")]
    H265,
}

impl VideoCodec {
    fn as_ffmpeg_args(&self) -> [&'static str; 2] {
        match self {
            Self::Copy => ["-c:v", "copy"],
            Self::H264 => ["-c:v", "libx264"],
            Self::H265 => ["-c:v", "libx265"],
        }
    }
}

/// Audio codec options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum AudioCodec {
    /// Copy audio stream without re-encoding.
    #[default]
    Copy,
    /// AAC codec.
    Aac,
    /// No audio.
    None,
}

impl AudioCodec {
    fn as_ffmpeg_args(&self) -> &'static [&'static str] {
        match self {
            Self::Copy => &["-c:a", "copy"],
            Self::Aac => &["-c:a", "aac"],
            Self::None => &["-an"],
        }
    }
}

/// What the transcode path should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// Output file. Defaults to the playlist path with an `mp4` extension.
    pub output: Option<PathBuf>,

    pub video_codec: VideoCodec,

    pub audio_codec: AudioCodec,

    /// Overwrite an existing output file.
    pub overwrite: bool,

    /// Extra output arguments appended before the output path.
    pub extra_args: Vec<String>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            output: None,
            video_codec: VideoCodec::default(),
            audio_codec: AudioCodec::default(),
            overwrite: true,
            extra_args: Vec::new(),
        }
    }
}

/// A single invocation of the transcoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    /// The trimmed playlist.
    pub input: PathBuf,
    pub output: PathBuf,
    /// Where the clip starts, relative to the start of `input`.
    pub offset: Duration,
    pub duration: Duration,
    pub options: TranscodeOptions,
}

/// Picks the transcoder output for a playlist written at `playlist_path`.
///
/// An explicit output must differ from the playlist. The derived output swaps
/// the extension for `mp4`, falling back to `<stem>_clip.mp4` when that would
/// overwrite the playlist itself.
pub fn determine_output_path(
    playlist_path: &Path,
    output_override: Option<&Path>,
) -> Result<PathBuf, ClipError> {
    if let Some(out) = output_override.filter(|p| !p.as_os_str().is_empty()) {
        if normalize_path(out) == normalize_path(playlist_path) {
            return Err(ClipError::Configuration {
                reason: format!(
                    "transcode output {} must not be the same as the playlist path",
                    out.display()
                ),
            });
        }
        return Ok(out.to_path_buf());
    }

    let candidate = playlist_path.with_extension("mp4");
    if candidate == playlist_path {
        let stem = playlist_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        return Ok(playlist_path.with_file_name(format!("{stem}_clip.mp4")));
    }
    Ok(candidate)
}

/// Absolute, lexically normalized form of `path` (`.` dropped, `..` folded).
///
/// The playlist does not exist yet when outputs are chosen, so this cannot
/// rely on `canonicalize`.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn format_secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

fn is_mp4_family(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref(),
        Some("mp4" | "mov" | "m4v")
    )
}

/// External collaborator that turns a trimmed playlist into a single file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcode(&self, job: &TranscodeJob) -> Result<(), ClipError>;
}

/// Runs `ffmpeg` as a child process.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    /// Uses `FFMPEG_PATH` when set, otherwise `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
        }
    }

    pub fn with_ffmpeg_path(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// First line of `ffmpeg -version`, if the binary can be run.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        String::from_utf8(output.stdout)
            .ok()
            .and_then(|s| s.lines().next().map(|l| l.to_string()))
    }

    fn build_args(&self, job: &TranscodeJob) -> Vec<String> {
        let options = &job.options;
        let mut args = Vec::new();

        if options.overwrite {
            args.push("-y".to_string());
        } else {
            args.push("-n".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostats".to_string());
        args.extend(["-loglevel".to_string(), "error".to_string()]);
        args.extend([
            "-protocol_whitelist".to_string(),
            PROTOCOL_WHITELIST.to_string(),
        ]);

        // Start offset (before input for faster seeking)
        if !job.offset.is_zero() {
            args.extend(["-ss".to_string(), format_secs(job.offset)]);
        }

        args.extend(["-i".to_string(), job.input.to_string_lossy().to_string()]);

        args.extend(["-t".to_string(), format_secs(job.duration)]);

        args.extend(options.video_codec.as_ffmpeg_args().map(String::from));
        args.extend(
            options
                .audio_codec
                .as_ffmpeg_args()
                .iter()
                .map(|s| s.to_string()),
        );

        let mp4_output = is_mp4_family(&job.output);

        // ADTS AAC from MPEG-TS segments needs repackaging for MP4 containers
        if mp4_output && options.audio_codec == AudioCodec::Copy {
            args.extend(["-bsf:a".to_string(), "aac_adtstoasc".to_string()]);
        }

        if mp4_output {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend(options.extra_args.iter().cloned());

        args.push(job.output.to_string_lossy().to_string());

        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(&self, job: &TranscodeJob) -> Result<(), ClipError> {
        let start = Instant::now();
        let args = self.build_args(job);
        debug!("FFmpeg args: {:?}", args);

        info!(
            offset = job.offset.as_secs_f64(),
            duration = job.duration.as_secs_f64(),
            "Transcoding {} -> {}",
            job.input.display(),
            job.output.display()
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ClipError::TranscoderNotFound {
                    program: self.ffmpeg_path.clone(),
                },
                _ => ClipError::Io { source: e },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr_tail = stderr
                .lines()
                .map(str::trim)
                .rfind(|l| !l.is_empty())
                .unwrap_or("Unknown ffmpeg error")
                .to_string();

            return Err(ClipError::TranscoderFailed {
                code: output.status.code().unwrap_or(-1),
                stderr_tail,
            });
        }

        info!(
            "Conversion complete in {:.2}s: {}",
            start.elapsed().as_secs_f64(),
            job.output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(output: &str) -> TranscodeJob {
        TranscodeJob {
            input: PathBuf::from("/clips/clip.m3u8"),
            output: PathBuf::from(output),
            offset: Duration::from_millis(4500),
            duration: Duration::from_secs(30),
            options: TranscodeOptions::default(),
        }
    }

    fn position(args: &[String], needle: &str) -> usize {
        args.iter()
            .position(|a| a == needle)
            .unwrap_or_else(|| panic!("{needle} missing from {args:?}"))
    }

    #[test]
    fn test_video_codec_args() {
        assert_eq!(VideoCodec::Copy.as_ffmpeg_args(), ["-c:v", "copy"]);
        assert_eq!(VideoCodec::H264.as_ffmpeg_args(), ["-c:v", "libx264"]);
        assert_eq!(VideoCodec::H265.as_ffmpeg_args(), ["-c:v", "libx265"]);
    }

    #[test]
    fn test_audio_codec_args() {
        assert_eq!(AudioCodec::Copy.as_ffmpeg_args(), ["-c:a", "copy"]);
        assert_eq!(AudioCodec::Aac.as_ffmpeg_args(), ["-c:a", "aac"]);
        assert_eq!(AudioCodec::None.as_ffmpeg_args(), ["-an"]);
    }

    #[test]
    fn test_build_args_copy_to_mp4() {
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("ffmpeg");
        let args = transcoder.build_args(&job("/clips/clip.mp4"));

        assert_eq!(args[0], "-y");
        assert_eq!(args[position(&args, "-protocol_whitelist") + 1], PROTOCOL_WHITELIST);
        assert_eq!(args[position(&args, "-ss") + 1], "4.500");
        assert_eq!(args[position(&args, "-t") + 1], "30.000");
        assert_eq!(args[position(&args, "-i") + 1], "/clips/clip.m3u8");
        assert!(position(&args, "-ss") < position(&args, "-i"));
        assert!(position(&args, "-i") < position(&args, "-t"));
        assert_eq!(args[position(&args, "-bsf:a") + 1], "aac_adtstoasc");
        assert!(args.contains(&"+faststart".to_string()));
        assert_eq!(args.last().unwrap(), "/clips/clip.mp4");
    }

    #[test]
    fn test_build_args_zero_offset_skips_seek() {
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("ffmpeg");
        let mut job = job("/clips/clip.mp4");
        job.offset = Duration::ZERO;
        let args = transcoder.build_args(&job);
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_build_args_mkv_has_no_mp4_flags() {
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("ffmpeg");
        let args = transcoder.build_args(&job("/clips/clip.mkv"));
        assert!(!args.contains(&"-bsf:a".to_string()));
        assert!(!args.contains(&"-movflags".to_string()));
    }

    #[test]
    fn test_build_args_with_reencode() {
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("ffmpeg");
        let mut job = job("/clips/clip.mp4");
        job.options = TranscodeOptions {
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Aac,
            overwrite: false,
            extra_args: vec!["-crf".to_string(), "20".to_string()],
            ..Default::default()
        };

        let args = transcoder.build_args(&job);

        assert_eq!(args[0], "-n");
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        // only stream-copied audio needs the bitstream filter
        assert!(!args.contains(&"-bsf:a".to_string()));
        assert_eq!(args[position(&args, "-crf") + 1], "20");
        assert!(position(&args, "-crf") < args.len() - 1);
    }

    #[test]
    fn test_determine_output_path_default() {
        let out = determine_output_path(Path::new("/clips/clip.m3u8"), None).unwrap();
        assert_eq!(out, PathBuf::from("/clips/clip.mp4"));

        let out = determine_output_path(Path::new("clip"), None).unwrap();
        assert_eq!(out, PathBuf::from("clip.mp4"));
    }

    #[test]
    fn test_determine_output_path_avoids_in_place_collision() {
        let out = determine_output_path(Path::new("/clips/clip.mp4"), None).unwrap();
        assert_eq!(out, PathBuf::from("/clips/clip_clip.mp4"));
    }

    #[test]
    fn test_determine_output_path_override() {
        let out = determine_output_path(
            Path::new("/clips/clip.m3u8"),
            Some(Path::new("/videos/out.mkv")),
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/videos/out.mkv"));

        let err = determine_output_path(
            Path::new("/clips/clip.m3u8"),
            Some(Path::new("/clips/clip.m3u8")),
        )
        .unwrap_err();
        assert!(matches!(err, ClipError::Configuration { .. }));
    }

    #[test]
    fn test_determine_output_path_rejects_other_spellings_of_playlist() {
        let playlist = Path::new("clip.m3u8");
        let cwd = std::env::current_dir().unwrap();

        for spelling in [
            PathBuf::from("./clip.m3u8"),
            PathBuf::from("nested/../clip.m3u8"),
            cwd.join("clip.m3u8"),
        ] {
            let err = determine_output_path(playlist, Some(&spelling)).unwrap_err();
            assert!(
                matches!(err, ClipError::Configuration { .. }),
                "{} should be rejected",
                spelling.display()
            );
        }

        let out = determine_output_path(playlist, Some(Path::new("./clip.mkv"))).unwrap();
        assert_eq!(out, PathBuf::from("./clip.mkv"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("/nonexistent/hlsclip-ffmpeg");
        let err = transcoder
            .transcode(&job("/clips/clip.mp4"))
            .await
            .unwrap_err();
        match err {
            ClipError::TranscoderNotFound { program } => {
                assert_eq!(program, "/nonexistent/hlsclip-ffmpeg")
            }
            other => panic!("expected TranscoderNotFound, got {other:?}"),
        }
        assert!(transcoder.version().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        // `false` ignores its arguments and exits with status 1
        let transcoder = FfmpegTranscoder::with_ffmpeg_path("false");
        let err = transcoder
            .transcode(&job("/clips/clip.mp4"))
            .await
            .unwrap_err();
        match err {
            ClipError::TranscoderFailed { code, stderr_tail } => {
                assert_eq!(code, 1);
                assert_eq!(stderr_tail, "Unknown ffmpeg error");
            }
            other => panic!("expected TranscoderFailed, got {other:?}"),
        }
    }
}
