// Unit Processor
// Fetches every member of a unit, writes result/error files, encrypts and records them.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{ExportUnit, JobStatus, OperationOutcome, OutputFile};
use crate::error::{AppError, Result};
use crate::port::{
    DataSource, Encryptor, FileStore, IdProvider, JobRepository, OutputFileRepository,
};

/// What happened to a delivered unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Processed {
        /// Members whose resources were written to the result file
        succeeded: usize,
        /// Members written to the error file
        failed: usize,
        files: Vec<String>,
    },
    /// Job is missing, Failed, Expired or Archived; the unit is dropped
    Skipped { reason: String },
}

pub struct UnitProcessor {
    job_repo: Arc<dyn JobRepository>,
    output_repo: Arc<dyn OutputFileRepository>,
    data_source: Arc<dyn DataSource>,
    encryptor: Arc<dyn Encryptor>,
    file_store: Arc<dyn FileStore>,
    id_provider: Arc<dyn IdProvider>,
}

impl UnitProcessor {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        output_repo: Arc<dyn OutputFileRepository>,
        data_source: Arc<dyn DataSource>,
        encryptor: Arc<dyn Encryptor>,
        file_store: Arc<dyn FileStore>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            job_repo,
            output_repo,
            data_source,
            encryptor,
            file_store,
            id_provider,
        }
    }

    /// Process one unit.
    ///
    /// Per-member fetch failures go to the error file. Storage and
    /// encryption failures abort the unit with an error and leave no
    /// record for the file being written.
    pub async fn process(&self, unit: &ExportUnit) -> Result<UnitOutcome> {
        let job = match self.job_repo.find_by_id(unit.job_id).await? {
            Some(job) => job,
            None => {
                warn!(job_id = %unit.job_id, seq = unit.seq, "Unit references unknown job");
                return Ok(UnitOutcome::Skipped {
                    reason: "job not found".to_string(),
                });
            }
        };
        // A Completed job still accepts units: the record count may reach
        // job_count before every unit has run.
        if matches!(
            job.status,
            JobStatus::Failed | JobStatus::Expired | JobStatus::Archived
        ) {
            info!(
                job_id = %job.id,
                seq = unit.seq,
                status = %job.status,
                "Skipping unit of finished job"
            );
            return Ok(UnitOutcome::Skipped {
                reason: format!("job is {}", job.status),
            });
        }

        if self
            .job_repo
            .transition_status(job.id, JobStatus::InProgress)
            .await?
        {
            info!(job_id = %job.id, "Job in progress");
        }

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded = 0;
        let mut failed = 0;

        for member_id in &unit.member_ids {
            match self
                .data_source
                .fetch(unit.resource_type, member_id, unit.job_id)
                .await
            {
                Ok(resource) => {
                    let entry = json!({
                        "fullUrl": format!("urn:uuid:{}", self.id_provider.generate_id()),
                        "resource": resource,
                    });
                    append_line(&mut results, &entry)?;
                    succeeded += 1;
                }
                Err(e) => {
                    warn!(
                        job_id = %unit.job_id,
                        seq = unit.seq,
                        member_id = %member_id,
                        error = %e,
                        "Member fetch failed"
                    );
                    let outcome = OperationOutcome::member_fetch_failure(
                        unit.resource_type.as_str(),
                        member_id,
                        &unit.org_id,
                    );
                    append_line(&mut errors, &outcome)?;
                    failed += 1;
                }
            }
        }

        let mut files = Vec::new();
        for (file_name, buffer) in [(unit.file_name(), results), (unit.error_file_name(), errors)] {
            if buffer.is_empty() {
                continue;
            }
            self.write_file(unit, &file_name, buffer).await?;
            files.push(file_name);
        }

        info!(
            job_id = %unit.job_id,
            seq = unit.seq,
            succeeded = succeeded,
            failed = failed,
            "Unit processed"
        );
        Ok(UnitOutcome::Processed {
            succeeded,
            failed,
            files,
        })
    }

    /// Stage, encrypt, publish and record one file
    async fn write_file(&self, unit: &ExportUnit, file_name: &str, plaintext: Vec<u8>) -> Result<()> {
        let job_id = unit.job_id;
        self.file_store
            .write_staged(job_id, file_name, &plaintext)
            .await?;

        let (payload, encrypted_key) = if unit.encrypt {
            let encryptor = Arc::clone(&self.encryptor);
            let org_id = unit.org_id.clone();
            let label = file_name.to_string();
            let encrypted = tokio::task::spawn_blocking(move || {
                encryptor.encrypt(&org_id, &plaintext, &label)
            })
            .await
            .map_err(|e| AppError::Internal(format!("encryption task failed: {}", e)))??;
            (encrypted.ciphertext, encrypted.wrapped_key)
        } else {
            (plaintext, Vec::new())
        };

        self.file_store.publish(job_id, file_name, &payload).await?;
        self.output_repo
            .record(&OutputFile::new(job_id, file_name, encrypted_key))
            .await?;

        if let Err(e) = self.file_store.remove_staged(job_id, file_name).await {
            warn!(job_id = %job_id, file = %file_name, error = %e, "Failed to remove staged file");
        }
        debug!(job_id = %job_id, file = %file_name, bytes = payload.len(), "File published");
        Ok(())
    }
}

fn append_line<T: serde::Serialize>(buffer: &mut Vec<u8>, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *buffer, value)?;
    buffer.push(b'\n');
    Ok(())
}
