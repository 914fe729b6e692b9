// Job Status Service
// Maps persisted job state plus elapsed time into what a polling client sees.

use chrono::{SecondsFormat, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::config::StatusConfig;
use crate::domain::{derive_effective_status, Job, JobId, JobStatus, Manifest, ResourceType};
use crate::error::{AppError, Result};
use crate::port::{FileStore, JobRepository, OutputFileRepository, TimeProvider};

/// Polling answer for one job
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    /// Pending or In Progress
    Accepted { status: JobStatus },
    Failed,
    Completed { manifest: Manifest, expires_at: i64 },
    /// Completed past TTL, or persisted Expired/Archived
    Gone { expires_at: i64 },
}

impl StatusReport {
    pub fn http_status(&self) -> u16 {
        match self {
            StatusReport::Accepted { .. } => 202,
            StatusReport::Failed => 500,
            StatusReport::Completed { .. } => 200,
            StatusReport::Gone { .. } => 410,
        }
    }

    /// `Expires` instant in epoch ms, where one applies
    pub fn expires_at(&self) -> Option<i64> {
        match self {
            StatusReport::Completed { expires_at, .. } | StatusReport::Gone { expires_at } => {
                Some(*expires_at)
            }
            _ => None,
        }
    }
}

pub struct JobStatusService {
    job_repo: Arc<dyn JobRepository>,
    output_repo: Arc<dyn OutputFileRepository>,
    file_store: Arc<dyn FileStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: StatusConfig,
}

impl JobStatusService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        output_repo: Arc<dyn OutputFileRepository>,
        file_store: Arc<dyn FileStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: StatusConfig,
    ) -> Self {
        Self {
            job_repo,
            output_repo,
            file_store,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Status of `raw_job_id` as seen by `org_id`.
    ///
    /// Malformed or unknown ids are `Lookup` errors; another organization's
    /// job is `NotFound`.
    pub async fn status(&self, raw_job_id: &str, org_id: &str) -> Result<StatusReport> {
        let job = self.find_owned_job(raw_job_id, org_id).await?;
        let now = self.time_provider.now_millis();
        let effective =
            derive_effective_status(job.status, job.created_at, now, self.config.job_ttl_ms);
        let expires_at = job.expires_at(self.config.job_ttl_ms);

        debug!(
            job_id = %job.id,
            persisted = %job.status,
            effective = %effective,
            "Resolved job status"
        );

        Ok(match effective {
            JobStatus::Pending | JobStatus::InProgress => StatusReport::Accepted { status: effective },
            JobStatus::Failed => StatusReport::Failed,
            JobStatus::Completed => StatusReport::Completed {
                manifest: self.manifest(&job).await?,
                expires_at,
            },
            JobStatus::Expired | JobStatus::Archived => StatusReport::Gone { expires_at },
        })
    }

    /// Published payload of a completed, unexpired job owned by `org_id`
    pub async fn read_file(&self, raw_job_id: &str, org_id: &str, file_name: &str) -> Result<Vec<u8>> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.contains("..") {
            return Err(AppError::NotFound(format!("File {} not found", file_name)));
        }

        let job = self.find_owned_job(raw_job_id, org_id).await?;
        let effective = derive_effective_status(
            job.status,
            job.created_at,
            self.time_provider.now_millis(),
            self.config.job_ttl_ms,
        );
        if effective != JobStatus::Completed {
            return Err(AppError::NotFound(format!(
                "Job {} has no downloadable files ({})",
                job.id, effective
            )));
        }

        self.file_store
            .read_payload(job.id, file_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_name)))
    }

    async fn find_owned_job(&self, raw_job_id: &str, org_id: &str) -> Result<Job> {
        let job_id: JobId = raw_job_id
            .trim()
            .parse()
            .map_err(|_| AppError::Lookup(format!("malformed job id {:?}", raw_job_id)))?;

        let job = self
            .job_repo
            .find_by_id(job_id)
            .await
            .map_err(|e| AppError::Lookup(e.to_string()))?
            .ok_or_else(|| AppError::Lookup(format!("job {} not found", job_id)))?;

        if !job.is_owned_by(org_id) {
            warn!(job_id = %job_id, org_id = %org_id, "Job requested by non-owning organization");
            return Err(AppError::NotFound(format!("Job {} not found", job_id)));
        }
        Ok(job)
    }

    async fn manifest(&self, job: &Job) -> Result<Manifest> {
        let resource_type = ResourceType::from_request_url(&job.request_url)?;
        let files = self.output_repo.find_by_job(job.id).await?;
        let transaction_time = Utc
            .timestamp_millis_opt(job.created_at)
            .single()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or_else(|| {
                AppError::InvalidState(format!("Job {} has invalid created_at", job.id))
            })?;

        Ok(Manifest::build(
            job,
            resource_type,
            &files,
            &self.config.data_base_url,
            transaction_time,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutputFile;
    use crate::port::file_store::mocks::InMemoryFileStore;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::output_file_repository::mocks::InMemoryOutputFileRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const CREATED_AT: i64 = 1_700_000_000_000;

    struct Fixture {
        jobs: Arc<InMemoryJobRepository>,
        files: Arc<InMemoryOutputFileRepository>,
        store: Arc<InMemoryFileStore>,
        clock: Arc<FixedTimeProvider>,
        service: JobStatusService,
    }

    fn fixture(status: JobStatus) -> Fixture {
        let jobs = Arc::new(InMemoryJobRepository::new());
        let mut job = Job::new(
            "A0001",
            "user-1",
            "https://bulkex.local/api/v1/ExplanationOfBenefit/$export",
            CREATED_AT,
        );
        job.id = 1;
        job.job_count = 1;
        job.status = status;
        jobs.put(job);

        let files = Arc::new(InMemoryOutputFileRepository::new());
        let store = Arc::new(InMemoryFileStore::new());
        let clock = Arc::new(FixedTimeProvider::new(CREATED_AT + HOUR_MS));
        let service = JobStatusService::new(
            jobs.clone(),
            files.clone(),
            store.clone(),
            clock.clone(),
            StatusConfig::new(24, "https://bulkex.local/data").unwrap(),
        );
        Fixture {
            jobs,
            files,
            store,
            clock,
            service,
        }
    }

    #[tokio::test]
    async fn test_in_progress_is_accepted() {
        let f = fixture(JobStatus::InProgress);
        let report = f.service.status("1", "A0001").await.unwrap();
        assert_eq!(
            report,
            StatusReport::Accepted {
                status: JobStatus::InProgress
            }
        );
        assert_eq!(report.http_status(), 202);
        assert_eq!(report.expires_at(), None);
    }

    #[tokio::test]
    async fn test_failed_is_500() {
        let f = fixture(JobStatus::Failed);
        assert_eq!(f.service.status("1", "A0001").await.unwrap().http_status(), 500);
    }

    #[tokio::test]
    async fn test_completed_returns_manifest() {
        let f = fixture(JobStatus::Completed);
        f.files
            .record(&OutputFile::new(1, "A0001-0.ndjson", vec![0xab]))
            .await
            .unwrap();
        f.files
            .record(&OutputFile::new(1, "A0001-0-error.ndjson", vec![0xcd]))
            .await
            .unwrap();

        let report = f.service.status("1", "A0001").await.unwrap();

        assert_eq!(report.http_status(), 200);
        assert_eq!(report.expires_at(), Some(CREATED_AT + 24 * HOUR_MS));
        let StatusReport::Completed { manifest, .. } = report else {
            panic!("expected completed report");
        };
        assert_eq!(manifest.output.len(), 1);
        assert_eq!(manifest.output[0].resource_type, "ExplanationOfBenefit");
        assert_eq!(
            manifest.output[0].url,
            "https://bulkex.local/data/1/A0001-0.ndjson"
        );
        assert_eq!(manifest.error.len(), 1);
        assert_eq!(manifest.key_map["A0001-0-error.ndjson"], "cd");
        assert_eq!(manifest.transaction_time, "2023-11-14T22:13:20.000Z");
    }

    #[tokio::test]
    async fn test_completed_past_ttl_is_gone() {
        let f = fixture(JobStatus::Completed);
        f.clock.set(CREATED_AT + 25 * HOUR_MS);

        let report = f.service.status("1", "A0001").await.unwrap();

        assert_eq!(
            report,
            StatusReport::Gone {
                expires_at: CREATED_AT + 24 * HOUR_MS
            }
        );
        assert_eq!(report.http_status(), 410);
    }

    #[tokio::test]
    async fn test_archived_is_gone() {
        let f = fixture(JobStatus::Archived);
        assert_eq!(f.service.status("1", "A0001").await.unwrap().http_status(), 410);
    }

    #[tokio::test]
    async fn test_unresolvable_ids_are_lookup_errors() {
        let f = fixture(JobStatus::Pending);
        assert!(matches!(
            f.service.status("abc", "A0001").await,
            Err(AppError::Lookup(_))
        ));
        assert!(matches!(
            f.service.status("99", "A0001").await,
            Err(AppError::Lookup(_))
        ));
    }

    #[tokio::test]
    async fn test_other_organization_gets_not_found() {
        let f = fixture(JobStatus::Completed);
        assert!(matches!(
            f.service.status("1", "A0002").await,
            Err(AppError::NotFound(_))
        ));
        assert!(f.service.status("1", "a0001").await.is_ok());
        assert!(f.jobs.get(1).is_some());
    }

    #[tokio::test]
    async fn test_read_file_requires_completed_job() {
        let f = fixture(JobStatus::Completed);
        f.store.publish(1, "A0001-0.ndjson", b"data").await.unwrap();

        assert_eq!(
            f.service.read_file("1", "A0001", "A0001-0.ndjson").await.unwrap(),
            b"data".to_vec()
        );
        assert!(f
            .service
            .read_file("1", "A0001", "../secret")
            .await
            .is_err());

        f.clock.set(CREATED_AT + 48 * HOUR_MS);
        assert!(matches!(
            f.service.read_file("1", "A0001", "A0001-0.ndjson").await,
            Err(AppError::NotFound(_))
        ));
    }
}
