use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Storage slot that holds the bearer token while a session is authenticated.
pub const TOKEN_SLOT: &str = "token";

/// How `/login` and `/register` receive the operator's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CredentialEncoding {
    /// `{"username": .., "password": ..}` request body.
    #[default]
    Json,
    /// `?username=..&password=..` query parameters with an empty body.
    Query,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub gateway_url: String,
    pub poll_interval: Duration,
    /// How long a simulation result stays visible before it is cleared.
    pub status_ttl: Duration,
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub credential_encoding: CredentialEncoding,
    /// Directory holding the persisted token. `None` uses the platform data dir.
    pub token_dir: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            status_ttl: DEFAULT_STATUS_TTL,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            credential_encoding: CredentialEncoding::default(),
            token_dir: None,
        }
    }
}

impl ConsoleConfig {
    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_credential_encoding(mut self, encoding: CredentialEncoding) -> Self {
        self.credential_encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        crate::api::GatewayUrls::new(&self.gateway_url).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid gateway url: {0}")]
    InvalidGatewayUrl(String),

    #[error("gateway url must use http:// or https://: {0}")]
    UnsupportedScheme(String),

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("no token directory configured and no platform data directory found")]
    NoTokenDir,
}
