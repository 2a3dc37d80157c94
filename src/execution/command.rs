//! External command worker.
//!
//! [`CommandWorker`] turns a program invocation into a unit of work: one
//! unit is one run of the configured command. This is the concrete worker
//! the binary wires up from YAML; library users can implement [`Worker`]
//! directly instead.
//!
//! ```ignore
//! use cadence::CommandWorker;
//! use std::time::Duration;
//!
//! let worker = CommandWorker::builder("./sync.sh")
//!     .arg("--once")
//!     .env("LOG_LEVEL", "info")
//!     .timeout(Duration::from_secs(300))
//!     .build();
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::core::worker::{WorkError, Worker};

/// Longest stderr excerpt carried in an error message.
const STDERR_EXCERPT_LEN: usize = 400;

/// A worker that runs an external command once per unit of work.
pub struct CommandWorker {
    name: String,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandWorker {
    /// Start building a worker for the given program.
    pub fn builder(program: impl Into<String>) -> CommandWorkerBuilder {
        CommandWorkerBuilder {
            name: None,
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    async fn execute_once(&self) -> Result<(), WorkError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| WorkError::Timeout(limit))?,
            None => command.output().await,
        };
        let output = output.map_err(|e| WorkError::Other(Box::new(e)))?;

        if output.status.success() {
            return Ok(());
        }

        let detail = stderr_excerpt(&output.stderr);
        Err(WorkError::Command {
            code: output.status.code().unwrap_or(-1),
            detail,
        })
    }
}

#[async_trait]
impl Worker for CommandWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, units: u32) -> Result<(), WorkError> {
        for _ in 0..units {
            self.execute_once().await?;
        }
        Ok(())
    }
}

/// Builder for [`CommandWorker`].
pub struct CommandWorkerBuilder {
    name: Option<String>,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandWorkerBuilder {
    /// Set the worker name; defaults to the program.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable for the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the per-unit timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the worker.
    pub fn build(self) -> CommandWorker {
        CommandWorker {
            name: self.name.unwrap_or_else(|| self.program.clone()),
            program: self.program,
            args: self.args,
            env: self.env,
            working_dir: self.working_dir,
            timeout: self.timeout,
        }
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_EXCERPT_LEN;
    // Keep the tail; that is where the actual failure usually is.
    let mut at = start;
    while !trimmed.is_char_boundary(at) {
        at += 1;
    }
    trimmed[at..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let worker = CommandWorker::builder("true").build();
        assert!(worker.run(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code() {
        let worker = CommandWorker::builder("false").build();

        let err = worker.run(1).await.unwrap_err();
        match err {
            WorkError::Command { code, .. } => assert_eq!(code, 1),
            other => panic!("expected Command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stderr_carried_in_error() {
        let worker = CommandWorker::builder("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .build();

        let err = worker.run(1).await.unwrap_err();
        match err {
            WorkError::Command { code, detail } => {
                assert_eq!(code, 3);
                assert_eq!(detail, "boom");
            }
            other => panic!("expected Command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let worker = CommandWorker::builder("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50))
            .build();

        let err = worker.run(1).await.unwrap_err();
        assert!(matches!(err, WorkError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let worker = CommandWorker::builder("/definitely/not/a/program").build();
        assert!(worker.run(1).await.is_err());
    }

    #[tokio::test]
    async fn test_env_reaches_the_command() {
        let worker = CommandWorker::builder("sh")
            .args(["-c", "test \"$GREETING\" = hello"])
            .env("GREETING", "hello")
            .build();

        assert!(worker.run(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_with_multiple_units() {
        let worker = CommandWorker::builder("true").build();
        assert!(worker.run(3).await.is_ok());
    }

    #[test]
    fn test_name_defaults_to_program() {
        let worker = CommandWorker::builder("rsync").build();
        assert_eq!(worker.name(), "rsync");

        let named = CommandWorker::builder("rsync").name("mirror").build();
        assert_eq!(named.name(), "mirror");
    }

    #[test]
    fn test_stderr_excerpt_keeps_tail() {
        let long = "x".repeat(1000) + " final error";
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.len() <= STDERR_EXCERPT_LEN);
        assert!(excerpt.ends_with("final error"));
    }
}
