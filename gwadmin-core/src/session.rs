//! Operator session: the current bearer credential and its persisted copy.
//!
//! The in-memory credential and the storage slot are kept reconciled: a present
//! credential is always persisted and an absent one has no persisted entry. The
//! store is the only writer of the slot.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError, Credentials};
use crate::config::TOKEN_SLOT;
use crate::credential::Credential;
use crate::storage::{CredentialStorage, StorageError};

const DETAIL_INVALID_CREDENTIALS: &str = "Invalid credentials";
const DETAIL_ALREADY_EXISTS: &str = "User already exists";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User already exists")]
    AlreadyExists,

    /// Every failure the gateway does not explain with a known detail.
    #[error("API Gateway is down")]
    ServiceUnavailable,

    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    fn from_login_failure(err: &ApiError) -> Self {
        if err.detail() == Some(DETAIL_INVALID_CREDENTIALS) {
            return Self::InvalidCredentials;
        }
        warn!(error = %err, "login failed");
        Self::ServiceUnavailable
    }

    fn from_register_failure(err: &ApiError) -> Self {
        if err.detail() == Some(DETAIL_ALREADY_EXISTS) {
            return Self::AlreadyExists;
        }
        warn!(error = %err, "registration failed");
        Self::ServiceUnavailable
    }
}

#[derive(Debug)]
pub struct SessionStore {
    storage: Arc<dyn CredentialStorage>,
    tx: watch::Sender<Option<Credential>>,
}

impl SessionStore {
    /// Restores the persisted credential. A blank persisted value is removed and
    /// treated as no session.
    pub fn open(storage: Arc<dyn CredentialStorage>) -> Result<Self, StorageError> {
        let credential = match storage.load(TOKEN_SLOT)? {
            Some(raw) => match Credential::parse(&raw) {
                Some(cred) => Some(cred),
                None => {
                    storage.remove(TOKEN_SLOT)?;
                    None
                }
            },
            None => None,
        };

        if credential.is_some() {
            info!("restored persisted session");
        }

        let (tx, _rx) = watch::channel(credential);
        Ok(Self { storage, tx })
    }

    pub fn credential(&self) -> Option<Credential> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Session changes as seen by views, the API client and the poller.
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }

    pub async fn login(
        &self,
        api: &ApiClient,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let res = api
            .login(&Credentials::new(username, password))
            .await
            .map_err(|err| AuthError::from_login_failure(&err))?;

        let Some(credential) = Credential::parse(&res.access_token) else {
            warn!("login response carried an empty access token");
            return Err(AuthError::ServiceUnavailable);
        };

        self.set(credential)?;
        info!(username, "logged in");
        Ok(())
    }

    /// Creates an account. The current session is left as it is.
    pub async fn register(
        &self,
        api: &ApiClient,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        api.register(&Credentials::new(username, password))
            .await
            .map_err(|err| AuthError::from_register_failure(&err))?;
        info!(username, "registered");
        Ok(())
    }

    /// Always ends the in-memory session, even if the persisted slot cannot be removed.
    pub fn logout(&self) {
        if let Err(err) = self.storage.remove(TOKEN_SLOT) {
            error!(error = %err, "failed to remove persisted session");
        }
        let previous = self.tx.send_replace(None);
        if previous.is_some() {
            info!("logged out");
        }
    }

    fn set(&self, credential: Credential) -> Result<(), StorageError> {
        self.storage.save(TOKEN_SLOT, credential.as_str())?;
        self.tx.send_replace(Some(credential));
        Ok(())
    }
}
