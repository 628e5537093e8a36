//! The sync orchestrator.

use crate::config::SyncConfig;
use mcstats_transfer::{AtomicFetcher, FileSource, RetryError, with_retries};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new database file was downloaded and committed.
    Completed,
    /// All attempts failed; the previous mirror file, if any, is untouched.
    Failed,
    /// Shutdown was requested before or during the sync; remaining attempts
    /// were abandoned.
    ShuttingDown,
}

impl SyncOutcome {
    /// Returns true if a new file was committed.
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Completed)
    }
}

/// Orchestrates downloads of the statistics database.
///
/// All syncs, periodic or on-demand, are serialized behind one mutex: at
/// most one physical download is ever in progress process-wide, which is
/// what makes the fetcher's temp-file staging safe. The periodic loop runs
/// as a background task that syncs immediately on start and then once per
/// interval, and a [`CancellationToken`] cancels both the loop and any
/// in-progress backoff wait during shutdown.
pub struct SyncManager<S: FileSource + 'static> {
    config: SyncConfig,
    fetcher: AtomicFetcher<S>,
    download_lock: tokio::sync::Mutex<()>,
    shutdown: RwLock<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: FileSource + 'static> SyncManager<S> {
    /// Creates a manager over the given file source.
    pub fn new(config: SyncConfig, source: Arc<S>) -> Self {
        Self {
            config,
            fetcher: AtomicFetcher::new(source),
            download_lock: tokio::sync::Mutex::new(()),
            shutdown: RwLock::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the periodic loop task is currently alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts the periodic sync task.
    ///
    /// The first sync runs immediately; subsequent syncs run once per
    /// configured interval. A no-op (with a warning) if the task is
    /// already running. A fresh cancellation token is installed on every
    /// start, so a manager can be started again after a stop.
    pub fn start_periodic(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("periodic sync task is already running");
            return;
        }

        let token = CancellationToken::new();
        *self.shutdown.write() = token.clone();

        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            manager.periodic_loop(token).await;
        }));
        info!(
            interval_secs = self.config.interval.as_secs(),
            "started periodic sync task"
        );
    }

    /// Stops the periodic sync task.
    ///
    /// Signals shutdown, waits up to `timeout` for the loop to drain, and
    /// aborts the task if it overruns. Teardown problems are logged, never
    /// propagated; the remote session is closed once the loop is gone.
    pub async fn stop_periodic(&self, timeout: Duration) {
        self.shutdown.read().cancel();

        let handle = self.task.lock().take();
        let Some(mut handle) = handle else {
            self.fetcher.source().close().await;
            return;
        };

        info!("stopping periodic sync task");
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => info!("periodic sync task stopped"),
            Ok(Err(join_err)) => {
                error!(error = %join_err, "periodic sync task terminated abnormally");
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "timed out waiting for periodic sync task, aborting"
                );
                handle.abort();
                if let Err(join_err) = (&mut handle).await {
                    if !join_err.is_cancelled() {
                        error!(error = %join_err, "periodic sync task failed during abort");
                    }
                }
            }
        }

        self.fetcher.source().close().await;
    }

    /// Runs one sync now, serialized with the periodic loop.
    ///
    /// Blocks on the process-wide download lock, then makes up to the
    /// configured number of attempts with backoff between them. Every
    /// failure mode is absorbed into the returned [`SyncOutcome`]; a sync
    /// can never take the process down.
    pub async fn sync_now(&self) -> SyncOutcome {
        let shutdown = self.shutdown.read().clone();
        let _guard = self.download_lock.lock().await;

        if shutdown.is_cancelled() {
            info!("shutdown requested, skipping sync");
            return SyncOutcome::ShuttingDown;
        }

        debug!(
            remote = %self.config.remote_path,
            local = %self.config.local_path.display(),
            "starting statistics database sync"
        );

        let fetcher = &self.fetcher;
        let remote = self.config.remote_path.as_str();
        let local = self.config.local_path.as_path();
        let result = with_retries(&self.config.retry, &shutdown, move || {
            fetcher.download(remote, local)
        })
        .await;

        match result {
            Ok(bytes) => {
                info!(bytes, local = %self.config.local_path.display(), "statistics database synced");
                SyncOutcome::Completed
            }
            Err(RetryError::Cancelled) => {
                info!("shutdown requested during sync backoff, abandoning remaining attempts");
                SyncOutcome::ShuttingDown
            }
            Err(RetryError::Operation(e)) => {
                error!(
                    attempts = self.config.retry.max_attempts,
                    error = %e,
                    "statistics database sync failed"
                );
                SyncOutcome::Failed
            }
        }
    }

    async fn periodic_loop(&self, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            debug!(
                interval_secs = self.config.interval.as_secs(),
                "periodic sync tick"
            );
            let outcome = self.sync_now().await;
            if outcome == SyncOutcome::ShuttingDown {
                break;
            }

            // A failed iteration never ends the loop, but it retries after
            // at most a minute instead of sitting out the whole interval.
            let wait = if outcome.is_success() {
                self.config.interval
            } else {
                self.config.interval.min(Duration::from_secs(60))
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("periodic sync loop stopped");
    }
}
