use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::api::{ApiClient, ApiError};
use crate::config::{ConfigError, ConsoleConfig};
use crate::metrics::MetricsSnapshot;
use crate::poller::{MetricsPoller, PollSubscription};
use crate::session::{AuthError, SessionStore};
use crate::simulation::{SimulationForm, run_simulation};
use crate::status::{SimulationStatus, StatusSlot};
use crate::storage::{CredentialStorage, FileStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which screen the session allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum View {
    Login,
    Dashboard,
}

/// Session, API client and poller wired together from one [`ConsoleConfig`].
#[derive(Debug)]
pub struct Console {
    config: ConsoleConfig,
    session: Arc<SessionStore>,
    api: ApiClient,
    poller: MetricsPoller<ApiClient>,
}

impl Console {
    pub fn new(
        config: ConsoleConfig,
        storage: Arc<dyn CredentialStorage>,
    ) -> Result<Self, ConsoleError> {
        config.validate()?;

        let session = Arc::new(SessionStore::open(storage)?);
        let api = ApiClient::new(&config, session.subscribe())?;
        let poller = MetricsPoller::new(api.clone(), config.poll_interval);

        Ok(Self {
            config,
            session,
            api,
            poller,
        })
    }

    /// Uses file storage in `config.token_dir`, or the platform data dir when unset.
    pub fn open(config: ConsoleConfig) -> Result<Self, ConsoleError> {
        let dir = match &config.token_dir {
            Some(dir) => dir.clone(),
            None => FileStorage::default_dir().ok_or(ConfigError::NoTokenDir)?,
        };
        Self::new(config, Arc::new(FileStorage::new(dir)))
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn poller(&self) -> &MetricsPoller<ApiClient> {
        &self.poller
    }

    pub fn active_view(&self) -> View {
        if self.session.is_authenticated() {
            View::Dashboard
        } else {
            View::Login
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.session.login(&self.api, username, password).await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.session.register(&self.api, username, password).await
    }

    /// Ends the session, stops polling and forgets the last snapshot. An in-flight
    /// fetch is left to finish; the poller discards its result.
    pub fn logout(&self) {
        self.session.logout();
        self.poller.stop();
        self.poller.reset();
    }

    /// Resets the gateway's counters and re-fetches so the view reflects the reset.
    pub async fn clear_metrics(&self) -> Result<Option<Arc<MetricsSnapshot>>, ApiError> {
        self.api.clear_metrics().await?;
        self.poller.refresh_now().await
    }

    /// Starts polling. Must be called from within a tokio runtime.
    pub fn open_dashboard(&self) -> Dashboard {
        Dashboard {
            subscription: self.poller.subscribe(),
            status: StatusSlot::new(self.config.status_ttl),
            api: self.api.clone(),
            poller: self.poller.clone(),
        }
    }
}

/// A mounted dashboard. Keeps the poller running and owns the simulation status;
/// dropping it stops both timers.
#[derive(Debug)]
pub struct Dashboard {
    subscription: PollSubscription,
    status: StatusSlot,
    api: ApiClient,
    poller: MetricsPoller<ApiClient>,
}

impl Dashboard {
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<MetricsSnapshot>>> {
        self.poller.snapshots()
    }

    pub fn latest(&self) -> Option<Arc<MetricsSnapshot>> {
        self.poller.latest()
    }

    pub fn poll_errors(&self) -> broadcast::Receiver<ApiError> {
        self.poller.errors()
    }

    pub fn status(&self) -> watch::Receiver<Option<SimulationStatus>> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> Option<SimulationStatus> {
        self.status.current()
    }

    pub async fn simulate(&self, form: &SimulationForm) -> SimulationStatus {
        run_simulation(&self.api, &form.build(), &self.status).await
    }

    pub fn teardown(self) {
        self.status.teardown();
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::poller::PollerState;
    use crate::storage::MemoryStorage;

    fn console(storage: MemoryStorage) -> Console {
        // Nothing listens here; every request fails fast.
        let config = ConsoleConfig::default().with_gateway_url("http://127.0.0.1:9");
        match Console::new(config, Arc::new(storage)) {
            Ok(v) => v,
            Err(err) => panic!("console: {err}"),
        }
    }

    #[test]
    fn active_view_follows_session() {
        let c = console(MemoryStorage::with_slot("token", "abc"));
        assert_eq!(c.active_view(), View::Dashboard);

        c.logout();
        assert_eq!(c.active_view(), View::Login);
        assert!(c.api().credential().is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ConsoleConfig::default().with_poll_interval(Duration::ZERO);
        let err = Console::new(config, Arc::new(MemoryStorage::new()));
        assert!(matches!(
            err,
            Err(ConsoleError::Config(ConfigError::ZeroPollInterval))
        ));
    }

    #[test]
    fn open_uses_configured_token_dir() {
        let dir = match tempfile::tempdir() {
            Ok(v) => v,
            Err(err) => panic!("tempdir: {err}"),
        };
        if let Err(err) = std::fs::write(dir.path().join("token"), "persisted") {
            panic!("seed token: {err}");
        }

        let config = ConsoleConfig::default().with_token_dir(dir.path());
        let c = match Console::open(config) {
            Ok(v) => v,
            Err(err) => panic!("open: {err}"),
        };
        assert_eq!(c.active_view(), View::Dashboard);
    }

    #[tokio::test]
    async fn dashboard_lifetime_drives_polling() {
        let c = console(MemoryStorage::new());
        assert_eq!(c.poller().state(), PollerState::Idle);

        let dashboard = c.open_dashboard();
        assert_eq!(c.poller().state(), PollerState::Polling);

        dashboard.teardown();
        assert_eq!(c.poller().state(), PollerState::Idle);

        let dashboard = c.open_dashboard();
        drop(dashboard);
        assert_eq!(c.poller().state(), PollerState::Idle);
    }

    #[tokio::test]
    async fn logout_idles_an_open_dashboard() {
        let c = console(MemoryStorage::with_slot("token", "abc"));
        let dashboard = c.open_dashboard();
        assert_eq!(c.poller().state(), PollerState::Polling);

        c.logout();
        assert_eq!(c.poller().state(), PollerState::Idle);
        assert!(dashboard.latest().is_none());

        dashboard.teardown();
        assert_eq!(c.poller().state(), PollerState::Idle);
    }
}
