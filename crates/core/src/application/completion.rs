// Completion Aggregator

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{JobId, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{FileStore, JobRepository, OutputFileRepository};

/// Result of one completion check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Job was already Completed; nothing was counted
    AlreadyComplete,
    /// This check moved the job to Completed
    Completed,
    /// Not every unit has reported yet
    Waiting { recorded: i64, expected: i32 },
    /// Job is Failed, Expired or Archived and is left alone
    Terminal(JobStatus),
}

pub struct CompletionAggregator {
    job_repo: Arc<dyn JobRepository>,
    output_repo: Arc<dyn OutputFileRepository>,
    file_store: Arc<dyn FileStore>,
}

impl CompletionAggregator {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        output_repo: Arc<dyn OutputFileRepository>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            job_repo,
            output_repo,
            file_store,
        }
    }

    /// Mark the job Completed once its recorded files reach the expected count.
    ///
    /// Safe to call any number of times and from concurrent workers: the
    /// transition is a conditional update, so at most one caller observes
    /// `Completed`.
    pub async fn check(&self, job_id: JobId) -> Result<CompletionOutcome> {
        let job = self
            .job_repo
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        match job.status {
            JobStatus::Completed => return Ok(CompletionOutcome::AlreadyComplete),
            status if status.is_terminal() => return Ok(CompletionOutcome::Terminal(status)),
            _ => {}
        }

        if job.job_count <= 0 {
            return Err(AppError::InvalidState(format!(
                "Job {} has no expected unit count ({})",
                job_id, job.job_count
            )));
        }

        // Units may write an error file alongside their result file, hence >=
        let recorded = self.output_repo.count_for_job(job_id).await?;
        if recorded < i64::from(job.job_count) {
            debug!(
                job_id = %job_id,
                recorded = recorded,
                expected = job.job_count,
                "Job still in progress"
            );
            return Ok(CompletionOutcome::Waiting {
                recorded,
                expected: job.job_count,
            });
        }

        if !self
            .job_repo
            .transition_status(job_id, JobStatus::Completed)
            .await?
        {
            debug!(job_id = %job_id, "Job completed concurrently");
            return Ok(CompletionOutcome::AlreadyComplete);
        }

        info!(
            job_id = %job_id,
            recorded = recorded,
            expected = job.job_count,
            "Job completed"
        );

        if let Err(e) = self.file_store.remove_staging_dir(job_id).await {
            warn!(job_id = %job_id, error = %e, "Failed to remove staging directory");
        }

        Ok(CompletionOutcome::Completed)
    }
}
