//! Client configuration.
//!
//! Everything the core needs is passed in at construction; nothing is read
//! from ambient process state here. The server binary resolves values from
//! CLI flags and environment variables.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{CloudError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api2.arduino.cc/iot";
pub const DEFAULT_TOKEN_URL: &str = "https://api2.arduino.cc/iot/v1/clients/token";
pub const DEFAULT_AUDIENCE: &str = "https://api2.arduino.cc/iot";

/// Default outbound request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default lifetime of the thing metadata cache (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Safety margin subtracted from the server-reported token lifetime.
pub const DEFAULT_TOKEN_MARGIN: Duration = Duration::from_secs(300);

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Connection settings for one Arduino Cloud API client.
#[derive(Clone)]
pub struct CloudConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: Url,
    pub token_url: Url,
    /// Audience requested in the client-credentials exchange.
    pub audience: String,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub token_margin: Duration,
    /// Extra attempts for failed reads. Writes are never retried.
    pub read_retries: u32,
    /// Wait before the first retry; doubled for every further attempt.
    pub retry_backoff: Duration,
}

impl CloudConfig {
    /// Create a config for the public Arduino Cloud endpoints.
    ///
    /// Credentials are not checked here; see [`CloudConfig::validate`].
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base_url: parse_url("api base URL", DEFAULT_API_BASE_URL)?,
            token_url: parse_url("token URL", DEFAULT_TOKEN_URL)?,
            audience: DEFAULT_AUDIENCE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            token_margin: DEFAULT_TOKEN_MARGIN,
            read_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Point both the resource API and the token endpoint at another host.
    ///
    /// The token endpoint keeps the platform layout (`/v1/clients/token`
    /// under the base URL).
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        self.api_base_url = parse_url("api base URL", base)?;
        self.token_url = parse_url("token URL", &format!("{base}/v1/clients/token"))?;
        Ok(self)
    }

    /// Check the settings before any network use.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(CloudError::Config("client id must not be empty".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(CloudError::Config("client secret must not be empty".into()));
        }
        for (name, url) in [("api base URL", &self.api_base_url), ("token URL", &self.token_url)] {
            if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
                return Err(CloudError::Config(format!(
                    "{name} must be an http(s) URL, got {url}"
                )));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(CloudError::Config("request timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("audience", &self.audience)
            .field("request_timeout", &self.request_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("token_margin", &self.token_margin)
            .field("read_retries", &self.read_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

/// Parse a user-supplied URL, naming the setting on failure.
pub fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| CloudError::Config(format!("invalid {name} {raw:?}: {e}")))
}
