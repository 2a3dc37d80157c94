//! Worker trait and error types.
//!
//! A `Worker` is the external collaborator that performs a job's actual
//! work. The scheduler only drives it: one call with `units = 1` is one
//! unit of work, and workers must tolerate being called repeatedly that
//! way. Everything behind the trait (what a unit actually does) is opaque
//! to the scheduler.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a unit of work can fail with.
///
/// Every variant is fatal to the unit that raised it and nothing more:
/// the batch loop logs it and moves on. The one exception is
/// [`WorkError::SessionUnavailable`], which signals that the whole batch
/// phase cannot proceed (see [`WorkError::is_phase_skip`]).
#[derive(Debug, Error)]
pub enum WorkError {
    /// An expected element was missing from the page or form being driven.
    #[error("required element not found: {0}")]
    MissingElement(String),

    /// A page load or redirect did not land where expected.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// No authenticated session is available; the batch phase is skipped.
    #[error("no authenticated session available")]
    SessionUnavailable,

    /// An input source (accounts, posts, images) was empty.
    #[error("no input data available: {0}")]
    NoData(String),

    /// An outbound HTTP call failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An external command exited with a nonzero status.
    #[error("command exited with code {code}: {detail}")]
    Command { code: i32, detail: String },

    /// The unit did not complete within its deadline.
    #[error("unit timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl WorkError {
    /// Whether this error means the remainder of the batch should be
    /// skipped instead of attempted unit by unit.
    pub fn is_phase_skip(&self) -> bool {
        matches!(self, WorkError::SessionUnavailable)
    }
}

/// The unit-of-work boundary between the scheduler and a job's body.
///
/// # Example
///
/// ```ignore
/// use cadence::{Worker, WorkError};
/// use async_trait::async_trait;
///
/// struct SyncWorker;
///
/// #[async_trait]
/// impl Worker for SyncWorker {
///     fn name(&self) -> &str {
///         "sync"
///     }
///
///     async fn run(&self, units: u32) -> Result<(), WorkError> {
///         for _ in 0..units {
///             // perform one unit of work
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync {
    /// Returns the name of this worker, for logging.
    fn name(&self) -> &str;

    /// Perform `units` units of work.
    ///
    /// The scheduler always calls this with `units = 1` and drives
    /// repetition itself, so implementations must be safe to invoke
    /// repeatedly with a single unit.
    async fn run(&self, units: u32) -> Result<(), WorkError>;
}
