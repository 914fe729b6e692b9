// Job Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::{DomainError, Result};

/// Job ID (database-assigned, opaque to clients)
pub type JobId = i64;

/// Owning organization identifier
pub type OrgId = String;

/// Owning user identifier
pub type UserId = String;

/// Persisted job status.
///
/// `Expired` and `Archived` are never written by the pipeline itself on the
/// happy path: a `Completed` job past its TTL is reported as `Expired` at
/// read time, and the archive scheduler persists `Archived` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(rename = "Archived")]
    Archived,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Expired => "Expired",
            JobStatus::Archived => "Archived",
        }
    }

    /// No unit may move a job out of these states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Expired | JobStatus::Archived
        )
    }

    /// Statuses from which a transition into `self` is allowed.
    ///
    /// Repositories use this to build conditional updates, so the
    /// transition check and the write happen in one statement.
    pub fn predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::InProgress => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Expired => &[JobStatus::Completed],
            JobStatus::Archived => &[JobStatus::Completed, JobStatus::Expired],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(JobStatus::Pending),
            "In Progress" => Ok(JobStatus::InProgress),
            "Completed" => Ok(JobStatus::Completed),
            "Failed" => Ok(JobStatus::Failed),
            "Expired" => Ok(JobStatus::Expired),
            "Archived" => Ok(JobStatus::Archived),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub org_id: OrgId,
    pub user_id: UserId,
    /// Original request URL; the resource type is derived from it
    pub request_url: String,
    pub status: JobStatus,
    /// Expected unit count, 0 until partitioning writes it
    pub job_count: i32,
    pub created_at: i64, // epoch ms
}

impl Job {
    /// Create a new Pending job.
    ///
    /// The id stays 0 until the repository assigns one on insert.
    pub fn new(
        org_id: impl Into<String>,
        user_id: impl Into<String>,
        request_url: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id: 0,
            org_id: org_id.into(),
            user_id: user_id.into(),
            request_url: request_url.into(),
            status: JobStatus::Pending,
            job_count: 0,
            created_at,
        }
    }

    /// Apply a status transition in memory
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Instant (epoch ms) at which a completed job's output stops being served
    pub fn expires_at(&self, ttl_ms: i64) -> i64 {
        self.created_at.saturating_add(ttl_ms)
    }

    /// Case-insensitive ownership check
    pub fn is_owned_by(&self, org_id: &str) -> bool {
        self.org_id.eq_ignore_ascii_case(org_id)
    }
}

/// Status the outside world should see for a job at `now`.
///
/// `Completed` becomes `Expired` once `now >= created_at + ttl_ms`.
/// Every other status passes through unchanged.
pub fn derive_effective_status(
    persisted: JobStatus,
    created_at: i64,
    now: i64,
    ttl_ms: i64,
) -> JobStatus {
    debug_assert!(ttl_ms >= 0, "job TTL must be non-negative");
    match persisted {
        JobStatus::Completed if now >= created_at.saturating_add(ttl_ms) => JobStatus::Expired,
        other => other,
    }
}
