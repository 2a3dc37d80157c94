//! Job definition.
//!
//! A [`JobSpec`] describes how the scheduler drives one worker: how often
//! it ticks, how many units a tick attempts, the daily ceiling, and the
//! pause between units within a batch.

use std::time::Duration;

use super::types::JobId;

/// Static description of a scheduled job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Unique job identifier.
    id: JobId,
    /// Human-readable name.
    name: String,
    /// Fixed period between ticks.
    interval: Duration,
    /// Maximum units per calendar date.
    daily_limit: u32,
    /// Units attempted per tick.
    units_per_tick: u32,
    /// Fixed pause between units within a batch.
    unit_pause: Duration,
    /// Whether the job's interval loop is started.
    enabled: bool,
}

impl JobSpec {
    /// Create a job spec with a one-unit tick, no pause, enabled.
    ///
    /// # Panics
    ///
    /// Panics if `daily_limit` is zero.
    pub fn new(id: impl Into<JobId>, name: impl Into<String>, interval: Duration, daily_limit: u32) -> Self {
        assert!(daily_limit > 0, "daily_limit cannot be zero");
        Self {
            id: id.into(),
            name: name.into(),
            interval,
            daily_limit,
            units_per_tick: 1,
            unit_pause: Duration::ZERO,
            enabled: true,
        }
    }

    /// Set how many units a single tick attempts.
    ///
    /// # Panics
    ///
    /// Panics if `units` is zero.
    pub fn with_units_per_tick(mut self, units: u32) -> Self {
        assert!(units > 0, "units_per_tick cannot be zero");
        self.units_per_tick = units;
        self
    }

    /// Set the pause between units within a batch.
    pub fn with_unit_pause(mut self, pause: Duration) -> Self {
        self.unit_pause = pause;
        self
    }

    /// Set whether the job's interval loop is started.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Get the job ID.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Get the job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed period between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum units per calendar date.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Units attempted per tick.
    pub fn units_per_tick(&self) -> u32 {
        self.units_per_tick
    }

    /// Pause between units within a batch.
    pub fn unit_pause(&self) -> Duration {
        self.unit_pause
    }

    /// Whether the job's interval loop is started.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = JobSpec::new("sync", "Sync", Duration::from_secs(3600), 50);

        assert_eq!(spec.id().as_str(), "sync");
        assert_eq!(spec.name(), "Sync");
        assert_eq!(spec.interval(), Duration::from_secs(3600));
        assert_eq!(spec.daily_limit(), 50);
        assert_eq!(spec.units_per_tick(), 1);
        assert_eq!(spec.unit_pause(), Duration::ZERO);
        assert!(spec.is_enabled());
    }

    #[test]
    fn test_spec_builders() {
        let spec = JobSpec::new("post", "Post", Duration::from_secs(43_200), 2)
            .with_units_per_tick(2)
            .with_unit_pause(Duration::from_secs(5))
            .with_enabled(false);

        assert_eq!(spec.units_per_tick(), 2);
        assert_eq!(spec.unit_pause(), Duration::from_secs(5));
        assert!(!spec.is_enabled());
    }

    #[test]
    #[should_panic(expected = "daily_limit cannot be zero")]
    fn test_spec_rejects_zero_limit() {
        let _spec = JobSpec::new("bad", "Bad", Duration::from_secs(60), 0);
    }

    #[test]
    #[should_panic(expected = "units_per_tick cannot be zero")]
    fn test_spec_rejects_zero_units_per_tick() {
        let _spec =
            JobSpec::new("bad", "Bad", Duration::from_secs(60), 1).with_units_per_tick(0);
    }
}
