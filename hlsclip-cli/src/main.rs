mod cli;
mod config;
mod error;
mod utils;

use std::{process, sync::Arc, time::Instant};

use clap::Parser;
use hls_clip::{
    ClipError, ClipInterval, ClipRequest, Clipper, FfmpegTranscoder, PlaylistLoader, Transcoder,
};
use tracing::{Level, debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{cli::Args, config::AppConfig, error::Result};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    // reject a bad range before touching the config file, the network or ffmpeg
    let interval = ClipInterval::new(args.start, args.end)?;

    let config = AppConfig::load(args.config.as_deref())?;
    let http_config = config.http_config(&args)?;

    let mut request = ClipRequest::new(&args.url, interval.start(), interval.end(), args.output.clone())?
        .with_variant(config.variant(&args)?);

    let transcoder: Option<Arc<dyn Transcoder>> = if args.convert {
        request = request.with_transcode(config.transcode_options(&args));

        let ffmpeg = FfmpegTranscoder::with_ffmpeg_path(config.ffmpeg_path(&args));
        match ffmpeg.version().await {
            Some(version) => debug!("Using {version}"),
            None => {
                return Err(ClipError::TranscoderNotFound {
                    program: ffmpeg.ffmpeg_path().to_string(),
                }
                .into());
            }
        }
        Some(Arc::new(ffmpeg) as Arc<dyn Transcoder>)
    } else {
        None
    };

    let clipper = Clipper::new(PlaylistLoader::from_config(&http_config)?, transcoder);

    let started = Instant::now();
    let outcome = clipper.run(&request).await?;

    info!(
        url = %request.source,
        segments = outcome.segments,
        clip_secs = outcome.clip_duration.as_secs_f64(),
        duration = ?started.elapsed(),
        "Clip complete"
    );
    if let Some(path) = &outcome.transcoded_path {
        info!("Video saved as {}", path.display());
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    subscriber
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
    Ok(())
}
