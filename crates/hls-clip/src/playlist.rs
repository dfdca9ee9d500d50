//! Fetching and resolving the media playlist a clip is cut from.

use std::{fmt, str::FromStr};

use m3u8_rs::{MasterPlaylist, MediaPlaylist, VariantStream, parse_playlist_res};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::{ClipError, HttpConfig};

/// How to pick a variant when the source URL points at a master playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantPolicy {
    #[default]
    Highest,
    Lowest,
    /// The variant whose bandwidth is nearest to the given bits per second.
    Closest(u64),
}

impl VariantPolicy {
    fn select<'a>(&self, master: &'a MasterPlaylist) -> Option<&'a VariantStream> {
        let candidates = master.variants.iter().filter(|v| !v.is_i_frame);
        match self {
            Self::Highest => candidates.max_by_key(|v| v.bandwidth),
            Self::Lowest => candidates.min_by_key(|v| v.bandwidth),
            Self::Closest(target) => candidates.min_by_key(|v| v.bandwidth.abs_diff(*target)),
        }
    }
}

impl FromStr for VariantPolicy {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest" | "best" => Ok(Self::Highest),
            "lowest" | "worst" => Ok(Self::Lowest),
            other => other
                .parse::<u64>()
                .map(Self::Closest)
                .map_err(|_| ClipError::Configuration {
                    reason: format!(
                        "invalid variant policy `{s}`: expected `highest`, `lowest` or a bandwidth in bits per second"
                    ),
                }),
        }
    }
}

impl fmt::Display for VariantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => f.write_str("highest"),
            Self::Lowest => f.write_str("lowest"),
            Self::Closest(bandwidth) => write!(f, "{bandwidth}"),
        }
    }
}

/// A media playlist together with the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct ResolvedPlaylist {
    pub playlist: MediaPlaylist,
    /// Base for resolving the relative URIs inside `playlist`.
    pub url: Url,
}

enum FetchedPlaylist {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

pub struct PlaylistLoader {
    client: Client,
}

impl PlaylistLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, ClipError> {
        Ok(Self::new(config.build_client()?))
    }

    /// Loads the media playlist behind `url`, following one level of master playlist.
    pub async fn load(&self, url: &Url, policy: VariantPolicy) -> Result<ResolvedPlaylist, ClipError> {
        match self.fetch(url).await? {
            FetchedPlaylist::Media(playlist) => Ok(self.resolved(playlist, url.clone())),
            FetchedPlaylist::Master(master) => {
                let variant = policy.select(&master).ok_or_else(|| {
                    ClipError::playlist(format!("master playlist {url} has no usable variants"))
                })?;
                let media_url = url.join(&variant.uri).map_err(|e| ClipError::InvalidUrl {
                    input: variant.uri.clone(),
                    reason: e.to_string(),
                })?;
                info!(
                    bandwidth = variant.bandwidth,
                    policy = %policy,
                    "Selected variant {media_url}"
                );

                match self.fetch(&media_url).await? {
                    FetchedPlaylist::Media(playlist) => Ok(self.resolved(playlist, media_url)),
                    FetchedPlaylist::Master(_) => Err(ClipError::playlist(format!(
                        "expected a media playlist at {media_url}, got a master playlist"
                    ))),
                }
            }
        }
    }

    fn resolved(&self, playlist: MediaPlaylist, url: Url) -> ResolvedPlaylist {
        if !playlist.end_list {
            warn!(
                "Playlist {url} has no #EXT-X-ENDLIST; only the {} segments listed now can be clipped",
                playlist.segments.len()
            );
        }
        debug!(
            segments = playlist.segments.len(),
            media_sequence = playlist.media_sequence,
            "Loaded media playlist {url}"
        );
        ResolvedPlaylist { playlist, url }
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPlaylist, ClipError> {
        debug!("Fetching playlist {url}");
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClipError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        match parse_playlist_res(&bytes) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(pl)) => Ok(FetchedPlaylist::Master(pl)),
            Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => Ok(FetchedPlaylist::Media(pl)),
            Err(e) => Err(ClipError::playlist(format!(
                "failed to parse playlist from {url}: {e}"
            ))),
        }
    }
}
