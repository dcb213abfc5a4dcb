//! Sync scheduler.
//!
//! One task decides *when* to talk to the remote store:
//! - a local mutation restarts a debounce deadline; when it passes without
//!   another mutation the current snapshot is saved,
//! - a periodic interval runs a full sync whether or not anything changed,
//! - going online flushes queued changes,
//! - an attempt that fails while online is retried with exponential
//!   backoff, a bounded number of times,
//! - gaining auth loads, flushes and subscribes; losing auth unsubscribes.

use std::sync::Arc;
use std::time::Duration;

use binder_engine::{SyncReason, SyncResult, UserId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::auth::AuthState;
use crate::config::{RetryPolicy, SyncConfig};
use crate::sync_client::RemoteSyncClient;

/// Messages to control the sync scheduler
#[derive(Debug)]
pub enum SchedulerMessage {
    /// Local state changed; restart the debounce
    LocalChange,
    /// Drop a pending debounced save
    CancelPending,
    /// Sync immediately and report the outcome
    SyncNow(oneshot::Sender<SyncResult>),
    /// Flush the queue and report the outcome
    Flush(oneshot::Sender<SyncResult>),
    /// Connectivity changed
    Connectivity(bool),
    /// Engine closing
    Shutdown,
}

/// Handle for the scheduler task
pub struct SyncScheduler {
    sender: mpsc::UnboundedSender<SchedulerMessage>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    /// Spawn the scheduler loop.
    pub fn start(
        client: Arc<RemoteSyncClient>,
        auth: watch::Receiver<AuthState>,
        config: &SyncConfig,
    ) -> Self {
        let (sender, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(
            client,
            auth,
            rx,
            config.debounce,
            config.sync_interval,
            Backoff::new(config.retry),
        ));
        Self {
            sender,
            task: Mutex::new(Some(task)),
        }
    }

    /// Note a local mutation. Only the last of a burst triggers a save.
    pub fn local_change(&self) {
        let _ = self.sender.send(SchedulerMessage::LocalChange);
    }

    pub fn cancel_pending(&self) {
        let _ = self.sender.send(SchedulerMessage::CancelPending);
    }

    /// Run a sync now. `None` once the scheduler has stopped.
    pub async fn sync_now(&self) -> Option<SyncResult> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(SchedulerMessage::SyncNow(tx)).ok()?;
        rx.await.ok()
    }

    /// Flush now. `None` once the scheduler has stopped.
    pub async fn flush(&self) -> Option<SyncResult> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(SchedulerMessage::Flush(tx)).ok()?;
        rx.await.ok()
    }

    pub fn connectivity_changed(&self, online: bool) {
        let _ = self.sender.send(SchedulerMessage::Connectivity(online));
    }

    /// Stop the loop and wait for it to finish its current attempt.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerMessage::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

async fn run(
    client: Arc<RemoteSyncClient>,
    mut auth: watch::Receiver<AuthState>,
    mut rx: mpsc::UnboundedReceiver<SchedulerMessage>,
    debounce: Duration,
    period: Duration,
    mut backoff: Backoff,
) {
    tracing::info!(
        debounce_ms = debounce.as_millis() as u64,
        period_secs = period.as_secs(),
        "Sync scheduler started"
    );

    let mut pending: Option<Instant> = None;
    let mut periodic = time::interval_at(Instant::now() + period, period);
    periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut user: Option<UserId> = None;
    let initial = auth.borrow_and_update().user_id().map(str::to_string);
    auth_changed(&client, &mut user, initial).await;
    let mut auth_open = true;

    loop {
        tokio::select! {
            _ = wait_until(pending) => {
                pending = None;
                let result = client.save().await;
                log_outcome("debounce", &result);
                backoff.record(&result, client.is_online());
            }
            _ = wait_until(backoff.next) => {
                let result = client.sync().await;
                log_outcome("retry", &result);
                backoff.record(&result, client.is_online());
            }
            _ = periodic.tick() => {
                // A periodic sync supersedes any pending debounce.
                pending = None;
                if user.is_some() {
                    client.subscribe().await;
                }
                let result = client.sync().await;
                log_outcome("periodic", &result);
                backoff.record(&result, client.is_online());
            }
            changed = auth.changed(), if auth_open => {
                if changed.is_err() {
                    auth_open = false;
                    continue;
                }
                let next = auth.borrow_and_update().user_id().map(str::to_string);
                if next.is_none() {
                    backoff.reset();
                }
                auth_changed(&client, &mut user, next).await;
            }
            message = rx.recv() => match message {
                Some(SchedulerMessage::LocalChange) => {
                    pending = Some(Instant::now() + debounce);
                }
                Some(SchedulerMessage::CancelPending) => {
                    pending = None;
                }
                Some(SchedulerMessage::SyncNow(reply)) => {
                    pending = None;
                    let result = client.sync().await;
                    log_outcome("manual", &result);
                    backoff.record(&result, client.is_online());
                    let _ = reply.send(result);
                }
                Some(SchedulerMessage::Flush(reply)) => {
                    let result = client.flush().await;
                    log_outcome("flush", &result);
                    backoff.record(&result, client.is_online());
                    let _ = reply.send(result);
                }
                Some(SchedulerMessage::Connectivity(true)) => {
                    tracing::info!("Back online; flushing pending changes");
                    let result = client.flush().await;
                    log_outcome("reconnect", &result);
                    backoff.record(&result, true);
                    if user.is_some() {
                        client.subscribe().await;
                    }
                }
                Some(SchedulerMessage::Connectivity(false)) => {
                    tracing::info!("Offline; remote writes will be queued");
                    backoff.reset();
                }
                Some(SchedulerMessage::Shutdown) | None => {
                    tracing::info!("Sync scheduler shutting down");
                    break;
                }
            }
        }
    }

    client.unsubscribe();
}

/// React to sign-in, sign-out or a user switch. Token refreshes never get
/// here: they do not wake the auth receiver.
async fn auth_changed(client: &Arc<RemoteSyncClient>, user: &mut Option<UserId>, next: Option<UserId>) {
    if *user == next {
        return;
    }

    match next {
        Some(user_id) => {
            tracing::info!(user_id = %user_id, "Authenticated; reconciling with remote");
            *user = Some(user_id);
            client.unsubscribe();
            log_outcome("sign-in load", &client.load().await);
            log_outcome("sign-in flush", &client.flush().await);
            log_outcome("sign-in subscribe", &client.subscribe().await);
        }
        None => {
            tracing::info!("Signed out; closing remote subscription");
            *user = None;
            client.unsubscribe();
        }
    }
}

/// Retry schedule for attempts that failed while online.
///
/// Silent failures (no session) and offline failures are not retried:
/// regaining auth or connectivity triggers its own attempt.
#[derive(Debug)]
struct Backoff {
    policy: RetryPolicy,
    retries: u32,
    next: Option<Instant>,
}

impl Backoff {
    fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: 0,
            next: None,
        }
    }

    fn reset(&mut self) {
        self.retries = 0;
        self.next = None;
    }

    /// Schedule the next retry after a failed attempt, or clear the
    /// schedule after a success.
    fn record(&mut self, result: &SyncResult, online: bool) {
        if !result.is_retryable() || !online {
            self.reset();
            return;
        }
        if self.retries >= self.policy.max_retries {
            if self.policy.max_retries > 0 {
                tracing::warn!(
                    retries = self.retries,
                    "Giving up retries until the next scheduled sync"
                );
            }
            self.reset();
            return;
        }

        let delay = self.policy.delay(self.retries);
        self.retries += 1;
        self.next = Some(Instant::now() + delay);
        tracing::debug!(
            retry = self.retries,
            delay_ms = delay.as_millis() as u64,
            "Scheduled sync retry"
        );
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Failures are already reported by the sync client at their own level.
fn log_outcome(trigger: &'static str, result: &SyncResult) {
    if result.success {
        tracing::debug!(trigger, cards = result.card_count, "Sync attempt succeeded");
    } else {
        tracing::debug!(
            trigger,
            reason = result.reason.as_ref().map(SyncReason::as_str),
            "Sync attempt did not complete"
        );
    }
}
