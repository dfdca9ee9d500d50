//! Optional TOML configuration merged underneath the command-line flags.
//!
//! ```toml
//! ffmpeg_path = "/usr/local/bin/ffmpeg"
//! timeout_secs = 20
//! variant = "highest"
//! video_codec = "copy"
//! audio_codec = "copy"
//! extra_ffmpeg_args = ["-map", "0"]
//!
//! [headers]
//! Referer = "https://example.com/"
//!
//! [proxy]
//! enabled = true
//! url = "http://127.0.0.1:8080"
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use hls_clip::{AudioCodec, HttpConfig, ProxyConfig, TranscodeOptions, VariantPolicy, VideoCodec};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cli::Args,
    error::{AppError, Result},
    utils::parse_headers,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ffmpeg_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub proxy: Option<ProxyConfig>,
    pub variant: Option<String>,
    pub video_codec: Option<VideoCodec>,
    pub audio_codec: Option<AudioCodec>,
    /// Output arguments appended right before the converted file path.
    pub extra_ffmpeg_args: Vec<String>,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hlsclip").join("config.toml"))
    }

    /// Loads `path` if given, else the default location when it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn http_config(&self, args: &Args) -> Result<HttpConfig> {
        let mut config = HttpConfig::default();

        if let Some(secs) = args.timeout.or(self.timeout_secs) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = args.user_agent.as_ref().or(self.user_agent.as_ref()) {
            config.user_agent = user_agent.clone();
        }

        for (name, value) in &self.headers {
            config = config.with_header(name, value)?;
        }
        // flags win over file headers with the same name
        for (name, value) in parse_headers(&args.headers)? {
            config = config.with_header(&name, &value)?;
        }

        config.proxy = if args.no_proxy {
            ProxyConfig::default()
        } else if let Some(url) = &args.proxy {
            ProxyConfig::explicit(url.clone())
        } else {
            self.proxy.clone().unwrap_or_else(ProxyConfig::system)
        };

        Ok(config)
    }

    pub fn variant(&self, args: &Args) -> Result<VariantPolicy> {
        if let Some(variant) = args.variant {
            return Ok(variant);
        }
        match &self.variant {
            Some(variant) => Ok(variant.parse::<VariantPolicy>()?),
            None => Ok(VariantPolicy::default()),
        }
    }

    pub fn ffmpeg_path(&self, args: &Args) -> String {
        args.ffmpeg_path
            .clone()
            .or_else(|| self.ffmpeg_path.clone())
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    pub fn transcode_options(&self, args: &Args) -> TranscodeOptions {
        TranscodeOptions {
            output: args.convert_output.clone(),
            video_codec: args.video_codec.or(self.video_codec).unwrap_or_default(),
            audio_codec: args.audio_codec.or(self.audio_codec).unwrap_or_default(),
            overwrite: !args.no_overwrite,
            extra_args: self.extra_ffmpeg_args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(extra: &[&str]) -> Args {
        let base = [
            "hlsclip", "-u", "https://example.com/a.m3u8", "-s", "00:00:00", "-e", "00:00:10",
            "-o", "a.m3u8",
        ];
        Args::try_parse_from(base.iter().chain(extra)).unwrap()
    }

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = config_file(
            r#"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
timeout_secs = 20
variant = "lowest"
video_codec = "h264"
extra_ffmpeg_args = ["-crf", "23"]

[headers]
Referer = "https://example.com/"

[proxy]
enabled = true
url = "http://127.0.0.1:8080"
"#,
        );

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.ffmpeg_path.as_deref(), Some("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, Some(20));
        assert_eq!(config.video_codec, Some(VideoCodec::H264));
        assert_eq!(config.audio_codec, None);
        assert_eq!(config.extra_ffmpeg_args, vec!["-crf", "23"]);
        assert_eq!(
            config.transcode_options(&args(&["-c"])).extra_args,
            vec!["-crf", "23"]
        );
        assert_eq!(
            config.proxy.as_ref().and_then(|p| p.url.as_deref()),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/hlsclip.toml"))).unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let file = config_file("timeout_secs = \"soon\"");
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppError::ConfigParse { .. }));
    }

    #[test]
    fn test_flags_override_file() {
        let config = AppConfig {
            ffmpeg_path: Some("/from/file".to_string()),
            timeout_secs: Some(20),
            variant: Some("lowest".to_string()),
            video_codec: Some(VideoCodec::H265),
            ..Default::default()
        };
        let args = args(&[
            "-c",
            "--ffmpeg",
            "/from/flag",
            "--timeout",
            "5",
            "--variant",
            "highest",
            "--video-codec",
            "copy",
        ]);

        assert_eq!(config.ffmpeg_path(&args), "/from/flag");
        assert_eq!(config.http_config(&args).unwrap().timeout, Duration::from_secs(5));
        assert_eq!(config.variant(&args).unwrap(), VariantPolicy::Highest);
        assert_eq!(config.transcode_options(&args).video_codec, VideoCodec::Copy);
    }

    #[test]
    fn test_file_values_used_without_flags() {
        let config = AppConfig {
            timeout_secs: Some(20),
            variant: Some("1500000".to_string()),
            audio_codec: Some(AudioCodec::None),
            ..Default::default()
        };
        let args = args(&[]);

        assert_eq!(config.http_config(&args).unwrap().timeout, Duration::from_secs(20));
        assert_eq!(config.variant(&args).unwrap(), VariantPolicy::Closest(1_500_000));
        let options = config.transcode_options(&args);
        assert_eq!(options.audio_codec, AudioCodec::None);
        assert!(options.overwrite);
        assert!(options.extra_args.is_empty());
    }

    #[test]
    fn test_invalid_variant_in_file() {
        let config = AppConfig {
            variant: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(config.variant(&args(&[])).is_err());
    }

    #[test]
    fn test_proxy_selection() {
        let config = AppConfig::default();

        let http = config.http_config(&args(&[])).unwrap();
        assert_eq!(http.proxy, ProxyConfig::system());

        let http = config.http_config(&args(&["--no-proxy"])).unwrap();
        assert!(!http.proxy.enabled);

        let http = config
            .http_config(&args(&["--proxy", "http://10.0.0.1:3128"]))
            .unwrap();
        assert_eq!(http.proxy.url.as_deref(), Some("http://10.0.0.1:3128"));
    }

    #[test]
    fn test_headers_merge() {
        let mut headers = BTreeMap::new();
        headers.insert("Referer".to_string(), "https://file.example/".to_string());
        headers.insert("Origin".to_string(), "https://file.example".to_string());
        let config = AppConfig {
            headers,
            ..Default::default()
        };

        let http = config
            .http_config(&args(&["-H", "Referer=https://flag.example/"]))
            .unwrap();
        assert_eq!(http.headers.get("referer").unwrap(), "https://flag.example/");
        assert_eq!(http.headers.get("origin").unwrap(), "https://file.example");
    }
}
