//! Core identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new JobId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_creation() {
        let job_id = JobId::new("nightly_sync");
        assert_eq!(job_id.as_str(), "nightly_sync");
    }

    #[test]
    fn test_job_id_display() {
        let job_id = JobId::new("ping");
        assert_eq!(format!("{}", job_id), "ping");
    }

    #[test]
    fn test_job_id_equality() {
        let id1 = JobId::new("job_a");
        let id2 = JobId::new("job_a");
        let id3 = JobId::new("job_b");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_job_id_from_str() {
        let id1: JobId = "my_job".into();
        let id2 = JobId::new("my_job");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_job_ids_are_hashable() {
        use std::collections::HashSet;

        let mut ids: HashSet<JobId> = HashSet::new();
        ids.insert(JobId::new("job1"));
        ids.insert(JobId::new("job2"));
        ids.insert(JobId::new("job1")); // duplicate

        assert_eq!(ids.len(), 2);
    }
}
