//! Scheduler engine: run locks, daily quotas, and interval dispatch.

mod engine;

pub use engine::{
    BatchReport, JobSnapshot, RunOutcome, Scheduler, SchedulerError, SchedulerHandle,
    DEFAULT_ROLLOVER_INTERVAL,
};
