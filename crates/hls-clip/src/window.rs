//! Selection of the segments that cover a [`ClipInterval`].
//!
//! Segment `i` spans `[t_i, t_i + d_i)` where `t_i` is the sum of the `#EXTINF`
//! durations before it. Every segment that shares time with the interval is
//! kept, so the first kept segment may start before the requested start and the
//! last one may end after the requested end. [`SegmentWindow::offset`] and
//! [`SegmentWindow::clip_duration`] describe the exact cut inside the window.

use std::{collections::HashMap, time::Duration};

use m3u8_rs::{ByteRange, Key, KeyMethod, Map, MediaPlaylist, MediaPlaylistType, MediaSegment};
use tracing::{debug, trace};
use url::Url;

use crate::{ClipError, ClipInterval};

/// The trimmed playlist and where it sits on the source timeline.
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    /// Self-contained VOD playlist with absolute URIs.
    pub playlist: MediaPlaylist,
    /// Source-timeline position of the first kept segment.
    pub window_start: Duration,
    /// Summed duration of the kept segments.
    pub covered: Duration,
    /// Media sequence number of the first kept segment.
    pub first_sequence: u64,
}

impl SegmentWindow {
    pub fn segment_count(&self) -> usize {
        self.playlist.segments.len()
    }

    pub fn window_end(&self) -> Duration {
        self.window_start + self.covered
    }

    /// Position of the requested start relative to the beginning of the window.
    pub fn offset(&self, interval: &ClipInterval) -> Duration {
        interval
            .start()
            .as_duration()
            .saturating_sub(self.window_start)
    }

    /// Requested duration, clamped to the media actually present in the window.
    pub fn clip_duration(&self, interval: &ClipInterval) -> Duration {
        interval
            .end()
            .as_duration()
            .min(self.window_end())
            .saturating_sub(interval.start().as_duration())
    }
}

/// `#EXTINF` duration of `segment`, rounded to whole microseconds.
///
/// m3u8-rs stores durations as `f32`; widening that directly turns `3.3` into
/// `3.2999999523`, which drifts the running total off segment boundaries. The
/// shortest decimal form of the `f32` is what the playlist actually said.
fn segment_duration(segment: &MediaSegment) -> Duration {
    let secs = segment
        .duration
        .to_string()
        .parse::<f64>()
        .unwrap_or(f64::from(segment.duration));
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((secs * 1_000_000.0).round() as u64)
}

/// Sum of all `#EXTINF` durations in the playlist.
pub fn total_duration(playlist: &MediaPlaylist) -> Duration {
    playlist.segments.iter().map(segment_duration).sum()
}

/// Builds the trimmed playlist covering `interval`.
///
/// `playlist_url` is the URL the playlist was loaded from; relative segment,
/// key and init-map URIs are resolved against it.
pub fn select_window(
    source: &MediaPlaylist,
    playlist_url: &Url,
    interval: &ClipInterval,
) -> Result<SegmentWindow, ClipError> {
    let mut header_tags = source.unknown_tags.clone();
    let mut inherited_map = take_playlist_level_map(&mut header_tags);
    let mut inherited_key: Option<Key> = None;
    let mut dropped_discontinuities = 0u64;

    let mut selected: Vec<MediaSegment> = Vec::new();
    let mut window_start = Duration::ZERO;
    let mut first_sequence = source.media_sequence;
    let mut covered = Duration::ZERO;
    let mut elapsed = Duration::ZERO;

    for (idx, segment) in source.segments.iter().enumerate() {
        let seg_start = elapsed;
        if seg_start >= interval.end().as_duration() {
            break;
        }
        let duration = segment_duration(segment);
        elapsed += duration;

        let in_window = interval.overlaps(seg_start, elapsed);
        if segment.uri.trim().is_empty() {
            if in_window {
                return Err(ClipError::playlist(format!(
                    "segment {} inside the requested window has no URI",
                    source.media_sequence + idx as u64
                )));
            }
            debug!(idx, "Skipping segment without URI");
            continue;
        }

        if !in_window {
            trace!(idx, ?seg_start, "Segment before window");
            if let Some(key) = &segment.key {
                inherited_key = Some(key.clone());
            }
            if let Some(map) = &segment.map {
                inherited_map = Some(map.clone());
            }
            if segment.discontinuity {
                dropped_discontinuities += 1;
            }
            continue;
        }

        let mut segment = segment.clone();
        if selected.is_empty() {
            window_start = seg_start;
            first_sequence = source.media_sequence + idx as u64;
            if segment.key.is_none() {
                segment.key = inherited_key.take();
            }
            if segment.map.is_none() {
                segment.map = inherited_map.take();
            }
        }
        absolutize_segment(&mut segment, playlist_url)?;

        covered += duration;
        selected.push(segment);
    }

    if selected.is_empty() {
        return Err(ClipError::EmptyWindow {
            start: interval.start().as_duration(),
            available: total_duration(source),
        });
    }

    debug!(
        segments = selected.len(),
        first_sequence,
        window_start = window_start.as_secs_f64(),
        covered = covered.as_secs_f64(),
        "Selected segment window"
    );

    let playlist = MediaPlaylist {
        segments: selected,
        media_sequence: first_sequence,
        discontinuity_sequence: source.discontinuity_sequence + dropped_discontinuities,
        end_list: true,
        playlist_type: Some(MediaPlaylistType::Vod),
        // EXT-X-START offsets refer to the untrimmed timeline
        start: None,
        unknown_tags: header_tags,
        ..source.clone()
    };

    Ok(SegmentWindow {
        playlist,
        window_start,
        covered,
        first_sequence,
    })
}

fn resolve_uri(base: &Url, uri: &str) -> Result<String, ClipError> {
    base.join(uri.trim())
        .map(String::from)
        .map_err(|e| ClipError::InvalidUrl {
            input: uri.to_string(),
            reason: e.to_string(),
        })
}

fn absolutize_segment(segment: &mut MediaSegment, base: &Url) -> Result<(), ClipError> {
    segment.uri = resolve_uri(base, &segment.uri)?;

    if let Some(key) = segment.key.as_mut()
        && key.method != KeyMethod::None
        && let Some(uri) = key.uri.as_deref()
    {
        key.uri = Some(resolve_uri(base, uri)?);
    }

    if let Some(map) = segment.map.as_mut() {
        map.uri = resolve_uri(base, &map.uri)?;
    }

    Ok(())
}

/// Pulls a header-level `#EXT-X-MAP` out of `tags`.
///
/// A map written before any segment tag is not attached to a segment by the
/// parser and shows up as an unknown `X-MAP` tag instead.
fn take_playlist_level_map(tags: &mut Vec<m3u8_rs::ExtTag>) -> Option<Map> {
    let pos = tags.iter().rposition(|t| t.tag == "X-MAP")?;
    let tag = tags.remove(pos);
    let rest = tag.rest?;

    let mut uri: Option<String> = None;
    let mut byte_range: Option<ByteRange> = None;

    for (key, value) in split_attribute_list(&rest) {
        if key.eq_ignore_ascii_case("URI") {
            uri = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("BYTERANGE") {
            let (len_str, offset_str) = value.split_once('@').unwrap_or((value, ""));
            if let Ok(length) = len_str.trim().parse::<u64>() {
                byte_range = Some(ByteRange {
                    length,
                    offset: offset_str.trim().parse::<u64>().ok(),
                });
            }
        }
    }

    Some(Map {
        uri: uri?,
        byte_range,
        other_attributes: HashMap::new(),
    })
}

/// Splits `KEY=VALUE,KEY="VALUE"` pairs, keeping quoted commas intact and
/// stripping the quotes.
fn split_attribute_list(rest: &str) -> Vec<(&str, &str)> {
    let mut parts: Vec<&str> = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(rest[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < rest.len() {
        parts.push(rest[start..].trim());
    }

    parts
        .into_iter()
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            (k.trim(), v)
        })
        .collect()
}
