use crate::config::ConfigError;

pub const PATH_LOGIN: &str = "/login";
pub const PATH_REGISTER: &str = "/register";
pub const PATH_METRICS: &str = "/metrics";
pub const PATH_METRICS_CLEAR: &str = "/metrics/clear";
pub const PATH_SIMULATE_TRAFFIC: &str = "/simulate-traffic";

/// Absolute endpoint URLs of one gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayUrls {
    pub base_url: String,
    pub login: String,
    pub register: String,
    pub metrics: String,
    pub metrics_clear: String,
    pub simulate_traffic: String,
}

impl GatewayUrls {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = url::Url::parse(base_url.trim())
            .map_err(|_| ConfigError::InvalidGatewayUrl(base_url.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(base_url.to_string()));
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidGatewayUrl(base_url.to_string()));
        }

        let base_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            login: format!("{base_url}{PATH_LOGIN}"),
            register: format!("{base_url}{PATH_REGISTER}"),
            metrics: format!("{base_url}{PATH_METRICS}"),
            metrics_clear: format!("{base_url}{PATH_METRICS_CLEAR}"),
            simulate_traffic: format!("{base_url}{PATH_SIMULATE_TRAFFIC}"),
            base_url,
        })
    }
}
