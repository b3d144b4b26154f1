//! Client for the gateway's admin REST endpoints.
//!
//! Every request carries the session's bearer credential when one is present.
//! Failures are decoded into [`ApiError`] here so callers never see raw JSON
//! error bodies. The client never retries.

mod error;
mod urls;
mod wire;

use std::time::Duration;

use bytes::Bytes;
use gwadmin_http::{HttpClient, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{ConfigError, ConsoleConfig, CredentialEncoding};
use crate::credential::Credential;
use crate::metrics::MetricsSnapshot;
use crate::simulation::SimulationRequest;

pub use error::ApiError;
pub use urls::GatewayUrls;
pub use wire::{Credentials, LoginResponse};

const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    urls: GatewayUrls,
    session: watch::Receiver<Option<Credential>>,
    request_timeout: Option<Duration>,
    credential_encoding: CredentialEncoding,
}

impl ApiClient {
    /// `session` is the credential channel from [`SessionStore::subscribe`](crate::SessionStore::subscribe).
    pub fn new(
        config: &ConsoleConfig,
        session: watch::Receiver<Option<Credential>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http: HttpClient::new(config.connect_timeout),
            urls: GatewayUrls::new(&config.gateway_url)?,
            session,
            request_timeout: config.request_timeout,
            credential_encoding: config.credential_encoding,
        })
    }

    pub fn urls(&self) -> &GatewayUrls {
        &self.urls
    }

    /// Credential that the next request will carry.
    pub fn credential(&self) -> Option<Credential> {
        self.session.borrow().clone()
    }

    pub async fn fetch_metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        let req = HttpRequest::get(&self.urls.metrics).header("accept", CONTENT_TYPE_JSON);
        let res = self.send(self.authorized(req)).await?;
        decode_json(&res)
    }

    /// Resets the gateway's counters. The caller re-fetches to observe the result.
    pub async fn clear_metrics(&self) -> Result<(), ApiError> {
        let req = HttpRequest::post(&self.urls.metrics_clear, Bytes::new());
        self.send(self.authorized(req)).await?;
        Ok(())
    }

    /// Confirms that the gateway accepted the run; the gateway executes it asynchronously.
    pub async fn submit_simulation(&self, request: &SimulationRequest) -> Result<(), ApiError> {
        let body =
            serde_json::to_vec(request).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let req = HttpRequest::post(&self.urls.simulate_traffic, Bytes::from(body))
            .header("content-type", CONTENT_TYPE_JSON);
        self.send(self.authorized(req)).await?;
        Ok(())
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let req = self.credentials_request(&self.urls.login, credentials)?;
        let res = self.send(req).await?;
        decode_json(&res)
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let req = self.credentials_request(&self.urls.register, credentials)?;
        self.send(req).await?;
        Ok(())
    }

    fn credentials_request(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<HttpRequest, ApiError> {
        match self.credential_encoding {
            CredentialEncoding::Json => {
                let body = serde_json::to_vec(credentials)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                Ok(HttpRequest::post(url, Bytes::from(body))
                    .header("content-type", CONTENT_TYPE_JSON))
            }
            CredentialEncoding::Query => {
                let mut url =
                    url::Url::parse(url).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                url.query_pairs_mut()
                    .append_pair("username", &credentials.username)
                    .append_pair("password", &credentials.password);
                Ok(HttpRequest::post_owned(url.into(), Bytes::new()))
            }
        }
    }

    fn authorized(&self, req: HttpRequest) -> HttpRequest {
        match self.credential() {
            Some(cred) => req.header("authorization", cred.bearer()),
            None => req,
        }
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = req.method.clone();
        // Never log the URL itself: query-encoded credentials live there.
        let path = req
            .url
            .strip_prefix(self.urls.base_url.as_str())
            .and_then(|rest| rest.split('?').next())
            .unwrap_or_default()
            .to_string();

        let res = self
            .http
            .request(req.timeout(self.request_timeout))
            .await
            .map_err(|err| {
                debug!(%method, %path, error = %err, "gateway request failed");
                ApiError::from(err)
            })?;

        debug!(%method, %path, status = res.status, "gateway response");
        if !res.is_success() {
            return Err(ApiError::from_response(&res));
        }
        Ok(res)
    }
}

fn decode_json<T: DeserializeOwned>(res: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&res.body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}
