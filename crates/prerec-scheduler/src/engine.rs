use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prerec_player::{PlaybackInvoker, PlaybackOutcome};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::{error::Result, store::JobStore, types::ScheduledJob};

/// Drives due jobs from the [`JobStore`] into the [`PlaybackInvoker`].
///
/// One loop claims due jobs; every claimed job plays on its own task, so a
/// long or unbounded playback never delays the next trigger.
pub struct SchedulerEngine {
    store: JobStore,
    invoker: Arc<dyn PlaybackInvoker>,
    poll_interval: Duration,
    in_flight: JoinSet<()>,
}

impl SchedulerEngine {
    pub fn new(store: JobStore, invoker: Arc<dyn PlaybackInvoker>, poll_interval: Duration) -> Self {
        Self {
            store,
            invoker,
            poll_interval,
            in_flight: JoinSet::new(),
        }
    }

    /// Main event loop. Polls every `poll_interval` until `shutdown` broadcasts
    /// `true` or its sender is dropped.
    ///
    /// In-flight playbacks are not awaited. Their players are killed when
    /// the runtime shuts down, and their rows, still `firing`, are discarded
    /// at the next startup.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "scheduler engine started");
        self.recover_on_startup();

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!("scheduler tick error: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(in_flight = self.in_flight.len(), "scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
        // Rows of detached playbacks stay `firing` unless the player returns
        // before the process exits.
        self.in_flight.detach_all();
    }

    /// Discard firings interrupted by a previous shutdown and report jobs
    /// whose trigger passed while the process was down. Interrupted jobs are
    /// never replayed; overdue pending jobs fire on the first tick, oldest
    /// trigger first.
    pub fn recover_on_startup(&self) {
        match self.store.discard_interrupted() {
            Ok(jobs) => {
                for job in jobs {
                    warn!(
                        job_id = %job.id,
                        name = %job.name,
                        trigger_at = %job.trigger_at,
                        "playback was interrupted by shutdown; job discarded"
                    );
                }
            }
            Err(e) => error!("interrupted-firing cleanup failed: {e}"),
        }
        match self.store.count_overdue(Utc::now()) {
            Ok(n) if n > 0 => warn!(count = n, "overdue jobs will fire now"),
            Err(e) => error!("overdue job count failed: {e}"),
            _ => {}
        }
    }

    /// Claim every job due at `now` and start its playback.
    ///
    /// Returns how many jobs were fired by this tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<usize> {
        self.reap_finished();

        let claimed = self.store.claim_due(now)?;
        let fired = claimed.len();
        for job in claimed {
            info!(
                job_id = %job.id,
                name = %job.name,
                file_path = %job.file_path,
                stop_after_secs = ?job.stop_after_secs,
                late_ms = (now - job.trigger_at).num_milliseconds(),
                "firing job"
            );
            let store = self.store.clone();
            let invoker = Arc::clone(&self.invoker);
            self.in_flight.spawn(fire(store, invoker, job));
        }
        Ok(fired)
    }

    /// Number of playbacks currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for every running playback to return.
    pub async fn join_in_flight(&mut self) {
        while let Some(res) = self.in_flight.join_next().await {
            log_join_error(res);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(res) = self.in_flight.try_join_next() {
            log_join_error(res);
        }
    }
}

fn log_join_error(res: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        if e.is_panic() {
            error!("playback task panicked; its job stays firing until restart");
        }
    }
}

/// Play one claimed job, log the outcome, and remove it from the store.
///
/// Failures are not retried and never reach an API caller.
async fn fire(store: JobStore, invoker: Arc<dyn PlaybackInvoker>, job: ScheduledJob) {
    match invoker.invoke(&job.file_path, job.stop_after()).await {
        Ok(PlaybackOutcome::Completed { elapsed }) => {
            info!(job_id = %job.id, name = %job.name, elapsed_secs = elapsed.as_secs(), "playback completed");
        }
        Ok(PlaybackOutcome::TimedOut { elapsed, limit }) => {
            info!(
                job_id = %job.id,
                name = %job.name,
                elapsed_secs = elapsed.as_secs(),
                limit_secs = limit.as_secs(),
                "playback stopped at stop time"
            );
        }
        Err(e) => {
            error!(job_id = %job.id, name = %job.name, file_path = %job.file_path, "playback failed: {e}");
        }
    }

    if let Err(e) = store.remove_fired(&job.id) {
        error!(job_id = %job.id, "failed to remove fired job: {e}");
    }
}
