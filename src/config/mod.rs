//! Configuration loading and parsing.
//!
//! Jobs and global settings come from a single YAML file; the listener
//! port comes from the `PORT` environment variable (with a default), as
//! hosting platforms conventionally inject it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::job::JobSpec;

/// Environment variable the listener port is read from.
pub const PORT_ENV_VAR: &str = "PORT";

/// Listener port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 10000;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The PORT environment variable was set but not a valid port.
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Global settings shared by all jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// URL to self-ping; keep-alive is disabled when unset.
    pub keepalive_url: Option<String>,
    /// Seconds between keep-alive pings.
    pub keepalive_interval_secs: u64,
    /// Seconds between date-rollover polls.
    pub rollover_interval_secs: u64,
    /// Per-request timeout for keep-alive pings, in seconds.
    pub ping_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            keepalive_url: None,
            keepalive_interval_secs: 60,
            rollover_interval_secs: 60,
            ping_timeout_secs: 30,
        }
    }
}

/// One job definition from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job identifier, unique within the file.
    pub id: String,
    /// Human-readable name; defaults to the id.
    pub name: Option<String>,
    /// Program to run for each unit of work.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the program.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the program.
    pub working_dir: Option<String>,
    /// Per-unit timeout in seconds; no timeout when unset.
    pub timeout_secs: Option<u64>,
    /// Seconds between ticks.
    pub interval_secs: u64,
    /// Maximum units per calendar date.
    pub daily_limit: u32,
    /// Units attempted per tick.
    #[serde(default = "default_units_per_tick")]
    pub units_per_tick: u32,
    /// Seconds to pause between units within a batch.
    #[serde(default)]
    pub unit_pause_secs: u64,
    /// Whether the job's interval loop is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_units_per_tick() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Build the scheduler-facing spec for this job.
    pub fn to_spec(&self) -> JobSpec {
        JobSpec::new(
            self.id.as_str(),
            self.name.as_deref().unwrap_or(self.id.as_str()),
            Duration::from_secs(self.interval_secs),
            self.daily_limit,
        )
        .with_units_per_tick(self.units_per_tick)
        .with_unit_pause(Duration::from_secs(self.unit_pause_secs))
        .with_enabled(self.enabled)
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Global settings.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Job definitions.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl ConfigFile {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ConfigFile = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.id.is_empty() {
                return Err(ConfigError::Invalid("job id cannot be empty".into()));
            }
            if !seen.insert(job.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate job id: {}", job.id)));
            }
            if job.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "job '{}': command cannot be empty",
                    job.id
                )));
            }
            if job.daily_limit == 0 {
                return Err(ConfigError::Invalid(format!(
                    "job '{}': daily_limit cannot be zero",
                    job.id
                )));
            }
            if job.interval_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "job '{}': interval_secs cannot be zero",
                    job.id
                )));
            }
            if job.units_per_tick == 0 {
                return Err(ConfigError::Invalid(format!(
                    "job '{}': units_per_tick cannot be zero",
                    job.id
                )));
            }
        }

        if self.global.keepalive_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "keepalive_interval_secs cannot be zero".into(),
            ));
        }
        if self.global.rollover_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rollover_interval_secs cannot be zero".into(),
            ));
        }

        Ok(())
    }
}

/// Read the listener port from the environment, defaulting when unset.
pub fn port_from_env() -> Result<u16, ConfigError> {
    match std::env::var(PORT_ENV_VAR) {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(value)),
        Err(_) => Ok(DEFAULT_PORT),
    }
}
