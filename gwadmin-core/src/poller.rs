//! Periodic metrics fetching.
//!
//! The poller is Idle until someone subscribes. While at least one
//! [`PollSubscription`] is alive it fetches immediately and then once per
//! interval. Ticks are sequential: the interval is measured from the schedule,
//! and a fetch that overruns it is followed immediately by the next one, after
//! which the schedule restarts from that point.
//!
//! A result is only published if the credential it was fetched with is still
//! the active one, so a logout while a fetch is in flight never resurrects
//! dashboard data. Results are also published in issue order: a fetch that
//! finishes after a newer one never replaces the newer snapshot.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::credential::Credential;
use crate::metrics::MetricsSnapshot;

const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Where snapshots come from.
pub trait MetricsSource: Send + Sync + 'static {
    fn fetch_metrics(&self) -> impl Future<Output = Result<MetricsSnapshot, ApiError>> + Send;

    /// Credential the next fetch is issued with.
    fn credential(&self) -> Option<Credential>;
}

impl MetricsSource for ApiClient {
    fn fetch_metrics(&self) -> impl Future<Output = Result<MetricsSnapshot, ApiError>> + Send {
        ApiClient::fetch_metrics(self)
    }

    fn credential(&self) -> Option<Credential> {
        ApiClient::credential(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PollerState {
    Idle,
    Polling,
}

pub struct MetricsPoller<S> {
    shared: Arc<Shared<S>>,
    control: Arc<Mutex<Control>>,
}

impl<S> Clone for MetricsPoller<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            control: self.control.clone(),
        }
    }
}

impl<S: MetricsSource> std::fmt::Debug for MetricsPoller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsPoller")
            .field("interval", &self.shared.interval)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct Shared<S> {
    source: S,
    interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<MetricsSnapshot>>>,
    errors_tx: broadcast::Sender<ApiError>,
    next_seq: AtomicU64,
    published_seq: Mutex<u64>,
}

#[derive(Debug, Default)]
struct Control {
    subscribers: usize,
    task: Option<PollTask>,
}

#[derive(Debug)]
struct PollTask {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl PollTask {
    fn cancel(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }

    /// Signals the loop to exit once the current fetch, if any, has finished.
    fn finish(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl<S: MetricsSource> MetricsPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        let (snapshot_tx, _rx) = watch::channel(None);
        let (errors_tx, _rx) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                source,
                interval,
                snapshot_tx,
                errors_tx,
                next_seq: AtomicU64::new(0),
                published_seq: Mutex::new(0),
            }),
            control: Arc::new(Mutex::new(Control::default())),
        }
    }

    pub fn state(&self) -> PollerState {
        if lock(&self.control).task.is_some() {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    pub fn latest(&self) -> Option<Arc<MetricsSnapshot>> {
        self.shared.snapshot_tx.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<MetricsSnapshot>>> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Failed ticks. Receivers that fall behind skip the oldest errors.
    pub fn errors(&self) -> broadcast::Receiver<ApiError> {
        self.shared.errors_tx.subscribe()
    }

    /// Starts polling if Idle. Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> PollSubscription {
        let mut control = lock(&self.control);
        control.subscribers += 1;
        if control.task.is_none() {
            debug!(interval = ?self.shared.interval, "metrics polling started");
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let shared = self.shared.clone();
            let handle = tokio::spawn(poll_loop(shared, shutdown_rx));
            control.task = Some(PollTask {
                shutdown_tx: Some(shutdown_tx),
                handle,
            });
        }

        PollSubscription {
            control: Some(self.control.clone()),
        }
    }

    /// Out-of-band fetch that leaves the tick schedule alone.
    ///
    /// Returns `Ok(None)` when there is no session or it changed while the fetch was
    /// in flight. If a newer fetch was published first, returns that snapshot.
    pub async fn refresh_now(&self) -> Result<Option<Arc<MetricsSnapshot>>, ApiError> {
        self.shared.fetch_and_publish().await
    }

    /// Stops the poll task without waiting for subscribers to go away, e.g. on
    /// logout. A fetch already in flight is left to finish. Live subscriptions stay
    /// counted, and the next [`subscribe`](Self::subscribe) starts a fresh schedule.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.control).task.take() {
            debug!("metrics polling stopped for session end");
            task.finish();
        }
    }

    /// Drops the cached snapshot, e.g. after logout.
    pub fn reset(&self) {
        self.shared.snapshot_tx.send_replace(None);
    }
}

impl<S: MetricsSource> Shared<S> {
    async fn fetch_and_publish(&self) -> Result<Option<Arc<MetricsSnapshot>>, ApiError> {
        let Some(issued_with) = self.source.credential() else {
            debug!("no session, skipping metrics fetch");
            return Ok(None);
        };
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let result = self.source.fetch_metrics().await;

        if self.source.credential().as_ref() != Some(&issued_with) {
            debug!("discarding metrics fetched for a stale session");
            return Ok(None);
        }

        let snapshot = Arc::new(result?);
        let mut published = lock(&self.published_seq);
        if seq < *published {
            debug!(
                seq,
                published = *published,
                "discarding metrics older than the published snapshot"
            );
            return Ok(self.snapshot_tx.borrow().clone());
        }
        *published = seq;
        self.snapshot_tx.send_replace(Some(snapshot.clone()));
        Ok(Some(snapshot))
    }

    async fn tick(&self) {
        if let Err(err) = self.fetch_and_publish().await {
            warn!(error = %err, "metrics poll failed");
            let _ = self.errors_tx.send(err);
        }
    }
}

async fn poll_loop<S: MetricsSource>(shared: Arc<Shared<S>>, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {}
        }

        // A started fetch runs to completion unless the task is aborted.
        shared.tick().await;
    }

    debug!("metrics polling stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps the poller running. Dropping the last subscription stops it.
#[derive(Debug)]
pub struct PollSubscription {
    control: Option<Arc<Mutex<Control>>>,
}

impl PollSubscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(control) = self.control.take() else {
            return;
        };

        let task = {
            let mut control = lock(&control);
            control.subscribers = control.subscribers.saturating_sub(1);
            if control.subscribers == 0 {
                control.task.take()
            } else {
                None
            }
        };

        if let Some(task) = task {
            task.cancel();
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
