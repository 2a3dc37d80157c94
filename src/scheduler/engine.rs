//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Keeping executions of the same job from overlapping (run lock)
//! - Enforcing each job's daily quota
//! - Zeroing quotas once per local-date rollover
//! - Driving workers on fixed intervals, continuing past unit failures
//! - Event emission
//!
//! Each loop (one per job, the rollover poll, the keep-alive ping) runs
//! as its own task under a shared cancellation token, so shutdown stops
//! every loop cleanly instead of leaning on process exit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::job::JobSpec;
use crate::core::quota::{Clock, DayTracker, JobState, SystemClock};
use crate::core::types::JobId;
use crate::core::worker::Worker;
use crate::events::{Event, EventBus};
use crate::keepalive::{self, Pinger};

/// Default polling period for date-rollover detection.
pub const DEFAULT_ROLLOVER_INTERVAL: Duration = Duration::from_secs(60);

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// A job with this ID is already registered.
    #[error("duplicate job id: {0}")]
    DuplicateJob(String),
}

/// What a tick's worth of units produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Units attempted (successes and failures both count).
    pub executed: u32,
    /// Attempted units that failed.
    pub failed: u32,
    /// Requested units never attempted (quota reached or phase skipped).
    pub skipped: u32,
}

/// Outcome of a single `try_run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run lock was free; a batch ran to completion.
    Ran(BatchReport),
    /// A run was already in flight; nothing was invoked.
    Skipped,
}

/// Read-only view of a job's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub done_today: u32,
    pub daily_limit: u32,
    pub running: bool,
    pub enabled: bool,
}

/// A registered job: its spec, mutable state, and worker.
struct RegisteredJob {
    spec: JobSpec,
    state: JobState,
    worker: Arc<dyn Worker>,
}

/// Shared core the loops and the handle both operate on.
struct Inner {
    jobs: HashMap<JobId, Arc<RegisteredJob>>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    day: tokio::sync::Mutex<DayTracker>,
}

impl Inner {
    /// Run a batch if the job's run lock is free; otherwise do nothing.
    ///
    /// The permit is held for exactly the duration of the batch and is
    /// released on every exit path, so the lock can never stay stuck.
    async fn try_run(&self, job: &RegisteredJob, remaining: u32) -> RunOutcome {
        let Some(_permit) = job.state.try_begin() else {
            debug!(job_id = %job.spec.id(), "Run already in flight, skipping tick");
            self.event_bus
                .emit(Event::RunSkipped {
                    job_id: job.spec.id().clone(),
                })
                .await;
            return RunOutcome::Skipped;
        };

        let report = self.run_daily_batch(job, remaining).await;
        RunOutcome::Ran(report)
    }

    /// Attempt up to `remaining` units, stopping early at the daily limit.
    ///
    /// Each unit's failure is logged and counted; the batch moves on to
    /// the next unit. A phase-skip error (no session) ends the batch
    /// without counting the unit.
    async fn run_daily_batch(&self, job: &RegisteredJob, remaining: u32) -> BatchReport {
        let mut report = BatchReport::default();

        for n in 0..remaining {
            if job.state.is_exhausted() {
                break;
            }

            if n > 0 && !job.spec.unit_pause().is_zero() {
                tokio::time::sleep(job.spec.unit_pause()).await;
            }

            match job.worker.run(1).await {
                Ok(()) => {
                    job.state.record_unit();
                    report.executed += 1;
                    debug!(
                        job_id = %job.spec.id(),
                        done_today = job.state.done_today(),
                        "Unit of work completed"
                    );
                    self.event_bus
                        .emit(Event::UnitCompleted {
                            job_id: job.spec.id().clone(),
                            done_today: job.state.done_today(),
                        })
                        .await;
                }
                Err(err) if err.is_phase_skip() => {
                    info!(job_id = %job.spec.id(), error = %err, "Batch phase skipped");
                    break;
                }
                Err(err) => {
                    job.state.record_unit();
                    report.executed += 1;
                    report.failed += 1;
                    warn!(job_id = %job.spec.id(), error = %err, "Unit of work failed, continuing batch");
                    self.event_bus
                        .emit(Event::UnitFailed {
                            job_id: job.spec.id().clone(),
                            error: err.to_string(),
                        })
                        .await;
                }
            }
        }

        report.skipped = remaining - report.executed;

        info!(
            job_id = %job.spec.id(),
            executed = report.executed,
            failed = report.failed,
            skipped = report.skipped,
            done_today = job.state.done_today(),
            "Batch finished"
        );
        self.event_bus
            .emit(Event::BatchFinished {
                job_id: job.spec.id().clone(),
                report,
            })
            .await;

        report
    }

    /// Poll the clock and, if the date changed since the last poll, zero
    /// every job's counter. Repeated calls within one date are no-ops.
    async fn check_day_rollover(&self) -> bool {
        let today = self.clock.today();
        let rolled = self.day.lock().await.observe(today);
        if !rolled {
            return false;
        }

        for job in self.jobs.values() {
            job.state.reset();
        }

        info!(date = %today, "Daily counters reset");
        self.event_bus.emit(Event::CountersReset { date: today }).await;
        true
    }
}

/// Keep-alive configuration: ping `url` every `interval`, forever.
struct KeepAlive {
    pinger: Arc<dyn Pinger>,
    url: String,
    interval: Duration,
}

/// Main scheduler: owns all job state, no ambient globals.
pub struct Scheduler {
    jobs: HashMap<JobId, Arc<RegisteredJob>>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    rollover_interval: Duration,
    keepalive: Option<KeepAlive>,
}

impl Scheduler {
    /// Create a scheduler with the system clock and default rollover poll.
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            event_bus: Arc::new(EventBus::new()),
            clock: Arc::new(SystemClock),
            rollover_interval: DEFAULT_ROLLOVER_INTERVAL,
            keepalive: None,
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the clock used for rollover detection.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the rollover polling period.
    pub fn with_rollover_interval(mut self, interval: Duration) -> Self {
        self.rollover_interval = interval;
        self
    }

    /// Ping `url` every `interval` once started. Failures are logged and
    /// the loop continues on the next tick, indefinitely.
    pub fn with_keepalive(
        mut self,
        pinger: Arc<dyn Pinger>,
        url: impl Into<String>,
        interval: Duration,
    ) -> Self {
        self.keepalive = Some(KeepAlive {
            pinger,
            url: url.into(),
            interval,
        });
        self
    }

    /// Register a job with the scheduler.
    pub fn register(
        &mut self,
        spec: JobSpec,
        worker: Arc<dyn Worker>,
    ) -> Result<(), SchedulerError> {
        let id = spec.id().clone();
        if self.jobs.contains_key(&id) {
            return Err(SchedulerError::DuplicateJob(id.to_string()));
        }

        let state = JobState::new(id.clone(), spec.daily_limit());
        self.jobs
            .insert(id, Arc::new(RegisteredJob { spec, state, worker }));
        Ok(())
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Start every loop and return a handle for control and shutdown.
    ///
    /// Each enabled job gets its own interval loop whose first tick fires
    /// immediately, plus one rollover poll and (if configured) one
    /// keep-alive loop. All loops share a cancellation token.
    pub fn start(self) -> SchedulerHandle {
        let today = self.clock.today();
        let inner = Arc::new(Inner {
            jobs: self.jobs,
            event_bus: self.event_bus,
            clock: self.clock,
            day: tokio::sync::Mutex::new(DayTracker::new(today)),
        });

        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for job in inner.jobs.values() {
            if !job.spec.is_enabled() {
                info!(job_id = %job.spec.id(), "Job disabled, not scheduling");
                continue;
            }
            tasks.push(tokio::spawn(run_job_loop(
                Arc::clone(&inner),
                Arc::clone(job),
                token.child_token(),
            )));
        }

        tasks.push(tokio::spawn(run_rollover_loop(
            Arc::clone(&inner),
            self.rollover_interval,
            token.child_token(),
        )));

        if let Some(ka) = self.keepalive {
            tasks.push(tokio::spawn(keepalive::run_ping_loop(
                ka.pinger,
                ka.url,
                ka.interval,
                Arc::clone(&inner.event_bus),
                token.child_token(),
            )));
        }

        SchedulerHandle {
            inner,
            token,
            tasks: Arc::new(tokio::sync::Mutex::new(tasks)),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Interval loop for one job. The first tick fires immediately.
async fn run_job_loop(inner: Arc<Inner>, job: Arc<RegisteredJob>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(job.spec.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                inner.try_run(&job, job.spec.units_per_tick()).await;
            }
        }
    }

    debug!(job_id = %job.spec.id(), "Job loop stopped");
}

/// Rollover polling loop.
async fn run_rollover_loop(inner: Arc<Inner>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                inner.check_day_rollover().await;
            }
        }
    }

    debug!("Rollover loop stopped");
}

/// Handle for controlling a started scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Inner>,
    token: CancellationToken,
    tasks: Arc<tokio::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl SchedulerHandle {
    /// Run one tick's worth of units for a job, unless it is already
    /// running, in which case nothing is invoked.
    pub async fn try_run(&self, job_id: &JobId) -> Result<RunOutcome, SchedulerError> {
        let job = self.get(job_id)?;
        let outcome = self.inner.try_run(&job, job.spec.units_per_tick()).await;
        Ok(outcome)
    }

    /// Run up to `remaining` units for a job under its run lock.
    pub async fn run_daily_batch(
        &self,
        job_id: &JobId,
        remaining: u32,
    ) -> Result<RunOutcome, SchedulerError> {
        let job = self.get(job_id)?;
        let outcome = self.inner.try_run(&job, remaining).await;
        Ok(outcome)
    }

    /// Poll for a date change, resetting counters if one happened.
    /// Returns whether a rollover occurred.
    pub async fn check_day_rollover(&self) -> bool {
        self.inner.check_day_rollover().await
    }

    /// Snapshot a job's current state.
    pub fn snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, SchedulerError> {
        let job = self.get(job_id)?;
        Ok(JobSnapshot {
            id: job.spec.id().clone(),
            name: job.spec.name().to_string(),
            done_today: job.state.done_today(),
            daily_limit: job.state.daily_limit(),
            running: job.state.is_running(),
            enabled: job.spec.is_enabled(),
        })
    }

    /// Snapshot every registered job.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut snaps: Vec<JobSnapshot> = self
            .inner
            .jobs
            .values()
            .map(|job| JobSnapshot {
                id: job.spec.id().clone(),
                name: job.spec.name().to_string(),
                done_today: job.state.done_today(),
                daily_limit: job.state.daily_limit(),
                running: job.state.is_running(),
                enabled: job.spec.is_enabled(),
            })
            .collect();
        snaps.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        snaps
    }

    /// Stop every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task panicked during shutdown");
            }
        }
        info!("Scheduler stopped");
    }

    fn get(&self, job_id: &JobId) -> Result<Arc<RegisteredJob>, SchedulerError> {
        self.inner
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))
    }
}
