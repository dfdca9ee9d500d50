use std::{sync::OnceLock, time::Duration};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ClipError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Proxy settings for playlist requests.
///
/// - `enabled = false` disables every proxy, including env/system ones
/// - `url = Some(..)` uses that proxy for all schemes, with optional basic auth
/// - `url = None` falls back to the system proxy when `use_system_proxy` is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_system_proxy: bool,
}

impl ProxyConfig {
    pub fn explicit(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn system() -> Self {
        Self {
            enabled: true,
            use_system_proxy: true,
            ..Default::default()
        }
    }

    fn apply(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder, ClipError> {
        if !self.enabled {
            return Ok(builder.no_proxy());
        }

        if let Some(url) = self.url.as_deref() {
            let mut proxy = reqwest::Proxy::all(url).map_err(|e| ClipError::Configuration {
                reason: format!("invalid proxy URL `{url}`: {e}"),
            })?;
            if let (Some(username), Some(password)) = (&self.username, &self.password) {
                proxy = proxy.basic_auth(username, password);
            }
            return Ok(builder.proxy(proxy));
        }

        if self.use_system_proxy {
            // reqwest picks up env/system proxies unless told otherwise
            return Ok(builder);
        }

        Ok(builder.no_proxy())
    }
}

/// HTTP settings for fetching playlists.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for each request. Zero disables it.
    pub timeout: Duration,

    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,

    pub user_agent: String,

    /// Extra headers sent with every request.
    pub headers: HeaderMap,

    pub proxy: ProxyConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HeaderMap::new(),
            proxy: ProxyConfig::system(),
        }
    }
}

impl HttpConfig {
    /// Adds a header, validating both name and value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ClipError> {
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
            ClipError::Configuration {
                reason: format!("invalid header name `{name}`: {e}"),
            }
        })?;
        let value =
            HeaderValue::from_str(value.trim()).map_err(|e| ClipError::Configuration {
                reason: format!("invalid value for header `{name}`: {e}"),
            })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn build_client(&self) -> Result<reqwest::Client, ClipError> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(self.headers.clone())
            .connect_timeout(self.connect_timeout);

        if self.timeout > Duration::ZERO {
            builder = builder.timeout(self.timeout);
        }

        builder = self.proxy.apply(builder)?;

        builder.build().map_err(|e| {
            warn!(error = %e, "Failed to build HTTP client");
            ClipError::Configuration {
                reason: format!("failed to build HTTP client: {e}"),
            }
        })
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}
