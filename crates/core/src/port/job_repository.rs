// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job, returning its assigned id
    async fn insert(&self, job: &Job) -> Result<JobId>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

    /// Write the expected unit count.
    ///
    /// The count is write-once: a job that already has a positive count
    /// is rejected with `InvalidState`.
    async fn set_job_count(&self, id: JobId, job_count: i32) -> Result<()>;

    /// Conditionally move a job to `to`.
    ///
    /// Applies only when the current status is one of `to.predecessors()`.
    /// Returns whether a row changed; `false` means the job was already
    /// past that point (or does not exist).
    async fn transition_status(&self, id: JobId, to: JobStatus) -> Result<bool>;

    /// Completed/Expired jobs created at or before `created_before`
    async fn find_archivable(&self, created_before: i64) -> Result<Vec<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory JobRepository with sequential ids starting at 1
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<BTreeMap<JobId, Job>>,
        fail_set_job_count: AtomicBool,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Overwrite a stored job (test setup)
        pub fn put(&self, job: Job) {
            self.jobs.lock().unwrap().insert(job.id, job);
        }

        /// Make every subsequent `set_job_count` fail
        pub fn fail_set_job_count(&self, fail: bool) {
            self.fail_set_job_count.store(fail, Ordering::SeqCst);
        }

        pub fn get(&self, id: JobId) -> Option<Job> {
            self.jobs.lock().unwrap().get(&id).cloned()
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<JobId> {
            let mut jobs = self.jobs.lock().unwrap();
            let id = jobs.keys().next_back().copied().unwrap_or(0) + 1;
            let mut stored = job.clone();
            stored.id = id;
            jobs.insert(id, stored);
            Ok(id)
        }

        async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
            Ok(self.get(id))
        }

        async fn set_job_count(&self, id: JobId, job_count: i32) -> Result<()> {
            if self.fail_set_job_count.load(Ordering::SeqCst) {
                return Err(AppError::Database("database is locked".to_string()));
            }
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
            if job.job_count > 0 {
                return Err(AppError::InvalidState(format!(
                    "Job {} already has job_count {}",
                    id, job.job_count
                )));
            }
            job.job_count = job_count;
            Ok(())
        }

        async fn transition_status(&self, id: JobId, to: JobStatus) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&id) {
                Some(job) if job.status.can_transition_to(to) => {
                    job.status = to;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn find_archivable(&self, created_before: i64) -> Result<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Expired))
                .filter(|j| j.created_at <= created_before)
                .cloned()
                .collect())
        }
    }
}
