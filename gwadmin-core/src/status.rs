use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Operator-facing feedback for a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStatus {
    pub text: String,
    pub kind: StatusKind,
}

impl SimulationStatus {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Info,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: StatusKind::Error,
        }
    }

    /// Results expire; the in-progress notice stays until a result replaces it.
    #[must_use]
    pub fn expires(&self) -> bool {
        self.kind != StatusKind::Info
    }
}

/// Holds the visible simulation status and tears result statuses down after a TTL.
#[derive(Debug)]
pub struct StatusSlot {
    tx: Arc<watch::Sender<Option<SimulationStatus>>>,
    ttl: Duration,
    generation: Arc<AtomicU64>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl StatusSlot {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            ttl,
            generation: Arc::new(AtomicU64::new(0)),
            timer: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<SimulationStatus> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SimulationStatus>> {
        self.tx.subscribe()
    }

    /// Replaces the visible status. Must be called from within a tokio runtime when
    /// `status` expires.
    pub fn show(&self, status: SimulationStatus) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.cancel_timer();

        let expires = status.expires();
        self.tx.send_replace(Some(status));
        if !expires {
            return;
        }

        let tx = self.tx.clone();
        let current = self.generation.clone();
        let ttl = self.ttl;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // Only clear the status this timer was armed for.
            tx.send_if_modified(|slot| {
                if current.load(Ordering::Acquire) == generation && slot.is_some() {
                    *slot = None;
                    true
                } else {
                    false
                }
            });
        });

        *self.lock_timer() = Some(handle);
    }

    /// Cancels a pending expiry without touching the visible status.
    pub fn teardown(&self) {
        self.cancel_timer();
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for StatusSlot {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
