//! Per-job run lock and daily quota tracking.
//!
//! [`JobState`] is the only mutable state the scheduler owns for a job:
//! how many units ran today, the daily ceiling, and the size-1 semaphore
//! that keeps executions of the same job from overlapping. State is
//! created at startup with a zero counter and is never persisted.
//!
//! [`DayTracker`] detects local-date rollover by polling, so counters can
//! be reset exactly once per date change.

use chrono::{Local, NaiveDate};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Semaphore, TryAcquireError};

use super::types::JobId;

/// Source of the current local calendar date.
///
/// Day identity is a local date, not an instant; rollover happens when the
/// date changes, wherever midnight falls.
pub trait Clock: Send + Sync {
    /// The current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Mutable per-job state: quota counter plus run lock.
pub struct JobState {
    id: JobId,
    daily_limit: u32,
    done_today: AtomicU32,
    /// Size-1 semaphore; holding the permit is what "running" means.
    lock: Semaphore,
}

impl std::fmt::Debug for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobState")
            .field("id", &self.id)
            .field("daily_limit", &self.daily_limit)
            .field("done_today", &self.done_today())
            .field("running", &self.is_running())
            .finish()
    }
}

impl JobState {
    /// Create state for a job with the given daily limit.
    ///
    /// # Panics
    ///
    /// Panics if `daily_limit` is zero.
    pub fn new(id: JobId, daily_limit: u32) -> Self {
        assert!(daily_limit > 0, "daily_limit cannot be zero");
        Self {
            id,
            daily_limit,
            done_today: AtomicU32::new(0),
            lock: Semaphore::new(1),
        }
    }

    /// Get the job ID.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The maximum units permitted per calendar date.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Units attempted so far today.
    pub fn done_today(&self) -> u32 {
        self.done_today.load(Ordering::SeqCst)
    }

    /// Units still permitted today.
    pub fn remaining_today(&self) -> u32 {
        self.daily_limit.saturating_sub(self.done_today())
    }

    /// Whether today's quota is used up.
    pub fn is_exhausted(&self) -> bool {
        self.done_today() >= self.daily_limit
    }

    /// Count one attempted unit against today's quota.
    ///
    /// Returns `false` (and leaves the counter untouched) if the quota is
    /// already exhausted, so the counter can never pass the limit no
    /// matter the call sequence.
    pub fn record_unit(&self) -> bool {
        self.done_today
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.daily_limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Zero the counter. Called only by the rollover sweep.
    pub fn reset(&self) {
        self.done_today.store(0, Ordering::SeqCst);
    }

    /// Try to take the run lock.
    ///
    /// Returns `None` if a run is already in flight. The returned permit
    /// releases the lock when dropped, whether the run succeeded, failed,
    /// or unwound.
    pub fn try_begin(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        match self.lock.try_acquire() {
            Ok(permit) => Some(permit),
            Err(TryAcquireError::NoPermits) => None,
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Whether a run currently holds the lock.
    pub fn is_running(&self) -> bool {
        self.lock.available_permits() == 0
    }
}

/// Tracks the last seen calendar date to detect rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTracker {
    last_day: NaiveDate,
}

impl DayTracker {
    /// Create a tracker anchored to the given date.
    pub fn new(today: NaiveDate) -> Self {
        Self { last_day: today }
    }

    /// Observe the current date, returning `true` exactly once per date
    /// change. Repeated calls within the same date return `false`.
    pub fn observe(&mut self, today: NaiveDate) -> bool {
        if today == self.last_day {
            return false;
        }
        self.last_day = today;
        true
    }

    /// The last date this tracker saw.
    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }
}
