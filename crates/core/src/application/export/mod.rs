// Export submission use case

pub mod dispatch;
pub mod partition;

pub use dispatch::Dispatcher;
pub use partition::{partition_members, Partitioner};

use std::sync::Arc;
use tracing::{error, info};

use crate::application::config::ExportConfig;
use crate::domain::{Job, JobStatus, ResourceType};
use crate::error::{AppError, Result};
use crate::port::{JobRepository, PopulationRepository, TimeProvider, WorkQueue};

/// A validated bulk export request
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub org_id: String,
    pub user_id: String,
    /// Full request URL; names the resource type
    pub request_url: String,
}

pub struct ExportService {
    job_repo: Arc<dyn JobRepository>,
    partitioner: Partitioner,
    dispatcher: Dispatcher,
    time_provider: Arc<dyn TimeProvider>,
    config: ExportConfig,
}

impl ExportService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        population: Arc<dyn PopulationRepository>,
        queue: Arc<dyn WorkQueue>,
        time_provider: Arc<dyn TimeProvider>,
        config: ExportConfig,
    ) -> Self {
        Self {
            job_repo,
            partitioner: Partitioner::new(population, config.max_batch_size),
            dispatcher: Dispatcher::new(queue),
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Resource type named by a request URL, if it is exportable here
    pub fn requested_type(&self, request_url: &str) -> Result<ResourceType> {
        let resource_type = ResourceType::from_request_url(request_url)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if !self.config.is_enabled(resource_type) {
            return Err(AppError::Validation(format!(
                "export of {} is not enabled",
                resource_type
            )));
        }
        Ok(resource_type)
    }

    /// Create a job, partition its population and dispatch its units.
    ///
    /// The expected unit count is persisted before any unit is published.
    /// A job whose count or units could not be persisted is marked Failed.
    pub async fn submit(&self, request: ExportRequest) -> Result<Job> {
        let resource_type = self.requested_type(&request.request_url)?;
        let members = self
            .partitioner
            .resolve_population(&request.org_id)
            .await?;

        let mut job = Job::new(
            &request.org_id,
            &request.user_id,
            &request.request_url,
            self.time_provider.now_millis(),
        );
        job.id = self.job_repo.insert(&job).await?;

        let encrypt = self.config.should_encrypt(resource_type);
        let units = self
            .partitioner
            .build_units(&job, resource_type, encrypt, &members);
        job.job_count = units.len() as i32;
        let queued = match self.job_repo.set_job_count(job.id, job.job_count).await {
            Ok(()) => self.dispatcher.dispatch(job.id, &units).await,
            Err(e) => Err(e),
        };

        if let Err(e) = queued {
            error!(job_id = %job.id, error = %e, "Job could not be queued, marking job failed");
            if let Err(mark_err) = self.job_repo.transition_status(job.id, JobStatus::Failed).await {
                error!(job_id = %job.id, error = %mark_err, "Failed to mark job failed");
            }
            return Err(e);
        }

        info!(
            job_id = %job.id,
            org_id = %job.org_id,
            resource_type = %resource_type,
            members = members.len(),
            units = job.job_count,
            "Export job submitted"
        );
        Ok(job)
    }
}
