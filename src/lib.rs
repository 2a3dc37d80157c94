//! cadence - a quota-aware interval job runner.
//!
//! Jobs are named units of work driven on fixed intervals. The scheduler
//! guarantees one execution per job at a time, caps units per calendar
//! date, resets the caps at local-date rollover, and keeps going past
//! individual unit failures. A keep-alive pinger and a one-route
//! liveness listener round out what a small always-on worker service
//! needs.

pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod keepalive;
pub mod scheduler;

pub use core::job::JobSpec;
pub use core::quota::{Clock, DayTracker, JobState, SystemClock};
pub use core::types::JobId;
pub use core::worker::{WorkError, Worker};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{CommandWorker, CommandWorkerBuilder};
pub use keepalive::{HttpPinger, PingError, Pinger};
pub use scheduler::{
    BatchReport, JobSnapshot, RunOutcome, Scheduler, SchedulerError, SchedulerHandle,
};
