// Archive Scheduler
// Persists Archived on jobs whose output outlived the TTL and reclaims their payload.

use crate::application::worker::ShutdownToken;
use crate::domain::JobStatus;
use crate::error::Result;
use crate::port::{FileStore, JobRepository, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

pub struct ArchiveScheduler {
    job_repo: Arc<dyn JobRepository>,
    file_store: Arc<dyn FileStore>,
    time_provider: Arc<dyn TimeProvider>,
    job_ttl_ms: i64,
    interval_hours: u64,
}

impl ArchiveScheduler {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        file_store: Arc<dyn FileStore>,
        time_provider: Arc<dyn TimeProvider>,
        job_ttl_ms: i64,
        interval_hours: u64,
    ) -> Self {
        Self {
            job_repo,
            file_store,
            time_provider,
            job_ttl_ms,
            interval_hours,
        }
    }

    /// Archive every expired job now. Returns the number archived.
    pub async fn archive_expired(&self) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - self.job_ttl_ms;
        let candidates = self.job_repo.find_archivable(cutoff).await?;
        let mut archived = 0;

        for job in candidates {
            if !self
                .job_repo
                .transition_status(job.id, JobStatus::Archived)
                .await?
            {
                continue;
            }
            if let Err(e) = self.file_store.remove_payload_dir(job.id).await {
                warn!(job_id = %job.id, error = %e, "Failed to remove payload directory");
            }
            info!(job_id = %job.id, org_id = %job.org_id, "Job archived");
            archived += 1;
        }
        Ok(archived)
    }

    /// Run archive loop (background task) until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_hours = self.interval_hours,
            job_ttl_ms = self.job_ttl_ms,
            "Archive scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_hours.max(1) * 3600));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.archive_expired().await {
                        Ok(count) => info!(archived = count, "Scheduled archive completed"),
                        Err(e) => error!(error = ?e, "Scheduled archive failed"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("Archive scheduler stopped");
                    break;
                }
            }
        }
    }
}
