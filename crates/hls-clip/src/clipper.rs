use std::{path::PathBuf, sync::Arc, time::Duration};

use tracing::{info, warn};
use url::Url;

use crate::{
    ClipError, ClipInterval, PlaylistLoader, Timestamp, TranscodeJob, TranscodeOptions,
    Transcoder, VariantPolicy, determine_output_path, select_window, write_playlist,
};

/// Everything needed to cut one clip.
#[derive(Debug, Clone)]
pub struct ClipRequest {
    pub source: Url,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Where the trimmed playlist is written.
    pub output: PathBuf,
    /// `Some` requests the transcode path.
    pub transcode: Option<TranscodeOptions>,
    pub variant: VariantPolicy,
}

impl ClipRequest {
    /// Parses the source URL. The time range is validated by [`ClipRequest::interval`].
    pub fn new(
        source: &str,
        start: Timestamp,
        end: Timestamp,
        output: impl Into<PathBuf>,
    ) -> Result<Self, ClipError> {
        let source = Url::parse(source).map_err(|e| ClipError::InvalidUrl {
            input: source.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(source.scheme(), "http" | "https") {
            return Err(ClipError::InvalidUrl {
                input: source.to_string(),
                reason: format!("unsupported scheme `{}`", source.scheme()),
            });
        }

        Ok(Self {
            source,
            start,
            end,
            output: output.into(),
            transcode: None,
            variant: VariantPolicy::default(),
        })
    }

    pub fn with_transcode(mut self, options: TranscodeOptions) -> Self {
        self.transcode = Some(options);
        self
    }

    pub fn with_variant(mut self, variant: VariantPolicy) -> Self {
        self.variant = variant;
        self
    }

    pub fn interval(&self) -> Result<ClipInterval, ClipError> {
        ClipInterval::new(self.start, self.end)
    }
}

/// What a finished clip produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOutcome {
    pub playlist_path: PathBuf,
    pub transcoded_path: Option<PathBuf>,
    pub segments: usize,
    /// Media duration of the kept segments.
    pub covered: Duration,
    /// Duration of the requested cut, clamped to the available media.
    pub clip_duration: Duration,
}

/// Selects the segments for a [`ClipRequest`] and drives the optional transcode.
pub struct Clipper {
    loader: PlaylistLoader,
    transcoder: Option<Arc<dyn Transcoder>>,
}

impl Clipper {
    pub fn new(loader: PlaylistLoader, transcoder: Option<Arc<dyn Transcoder>>) -> Self {
        Self { loader, transcoder }
    }

    pub async fn run(&self, request: &ClipRequest) -> Result<ClipOutcome, ClipError> {
        // nothing below may touch the network or disk before these checks
        let interval = request.interval()?;
        let transcode = match &request.transcode {
            Some(options) => {
                let transcoder = self.transcoder.as_ref().ok_or_else(|| ClipError::Configuration {
                    reason: "transcoding was requested but no transcoder is configured".to_string(),
                })?;
                let output =
                    determine_output_path(&request.output, options.output.as_deref())?;
                Some((transcoder, options, output))
            }
            None => None,
        };

        info!(
            url = %request.source,
            start = %interval.start(),
            end = %interval.end(),
            "Clipping playlist"
        );

        let resolved = self.loader.load(&request.source, request.variant).await?;
        let window = select_window(&resolved.playlist, &resolved.url, &interval)?;

        let clip_duration = window.clip_duration(&interval);
        if clip_duration < interval.duration() {
            warn!(
                requested = interval.duration().as_secs_f64(),
                available = clip_duration.as_secs_f64(),
                "Requested end lies beyond the playlist; clip will be shorter"
            );
        }

        write_playlist(&request.output, &window.playlist).await?;

        let transcoded_path = match transcode {
            Some((transcoder, options, output)) => {
                let job = TranscodeJob {
                    input: request.output.clone(),
                    output,
                    offset: window.offset(&interval),
                    duration: clip_duration,
                    options: options.clone(),
                };
                info!(transcoder = transcoder.name(), "Starting conversion");
                transcoder.transcode(&job).await?;
                Some(job.output)
            }
            None => None,
        };

        Ok(ClipOutcome {
            playlist_path: request.output.clone(),
            transcoded_path,
            segments: window.segment_count(),
            covered: window.covered,
            clip_duration,
        })
    }
}
