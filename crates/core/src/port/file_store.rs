// File Store Port
// Job-scoped staging area plus the published payload area served to clients.

use crate::domain::JobId;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write plaintext into the job's staging directory
    async fn write_staged(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()>;

    async fn remove_staged(&self, job_id: JobId, file_name: &str) -> Result<()>;

    /// Atomically place a payload file (temp file + rename). Overwrites.
    async fn publish(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()>;

    /// Read a published payload, `None` when absent
    async fn read_payload(&self, job_id: JobId, file_name: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the job's staging directory. Missing directory is not an error.
    async fn remove_staging_dir(&self, job_id: JobId) -> Result<()>;

    /// Remove the job's payload directory. Missing directory is not an error.
    async fn remove_payload_dir(&self, job_id: JobId) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryFileStore {
        staged: Mutex<BTreeMap<(JobId, String), Vec<u8>>>,
        payload: Mutex<BTreeMap<(JobId, String), Vec<u8>>>,
        staging_dirs_removed: Mutex<HashSet<JobId>>,
        fail_publish: AtomicBool,
    }

    impl InMemoryFileStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_publish(&self, fail: bool) {
            self.fail_publish.store(fail, Ordering::SeqCst);
        }

        pub fn payload(&self, job_id: JobId, file_name: &str) -> Option<Vec<u8>> {
            self.payload
                .lock()
                .unwrap()
                .get(&(job_id, file_name.to_string()))
                .cloned()
        }

        pub fn payload_names(&self, job_id: JobId) -> Vec<String> {
            self.payload
                .lock()
                .unwrap()
                .keys()
                .filter(|(id, _)| *id == job_id)
                .map(|(_, name)| name.clone())
                .collect()
        }

        pub fn staged_count(&self, job_id: JobId) -> usize {
            self.staged
                .lock()
                .unwrap()
                .keys()
                .filter(|(id, _)| *id == job_id)
                .count()
        }

        pub fn staging_dir_removed(&self, job_id: JobId) -> bool {
            self.staging_dirs_removed.lock().unwrap().contains(&job_id)
        }
    }

    #[async_trait]
    impl FileStore for InMemoryFileStore {
        async fn write_staged(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()> {
            self.staged
                .lock()
                .unwrap()
                .insert((job_id, file_name.to_string()), bytes.to_vec());
            Ok(())
        }

        async fn remove_staged(&self, job_id: JobId, file_name: &str) -> Result<()> {
            self.staged
                .lock()
                .unwrap()
                .remove(&(job_id, file_name.to_string()));
            Ok(())
        }

        async fn publish(&self, job_id: JobId, file_name: &str, bytes: &[u8]) -> Result<()> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(AppError::Storage("disk full".to_string()));
            }
            self.payload
                .lock()
                .unwrap()
                .insert((job_id, file_name.to_string()), bytes.to_vec());
            Ok(())
        }

        async fn read_payload(&self, job_id: JobId, file_name: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.payload(job_id, file_name))
        }

        async fn remove_staging_dir(&self, job_id: JobId) -> Result<()> {
            self.staged.lock().unwrap().retain(|(id, _), _| *id != job_id);
            self.staging_dirs_removed.lock().unwrap().insert(job_id);
            Ok(())
        }

        async fn remove_payload_dir(&self, job_id: JobId) -> Result<()> {
            self.payload.lock().unwrap().retain(|(id, _), _| *id != job_id);
            Ok(())
        }
    }
}
