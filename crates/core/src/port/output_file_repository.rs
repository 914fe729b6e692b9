// Output File Repository Port

use crate::domain::{JobId, OutputFile};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait OutputFileRepository: Send + Sync {
    /// Record a published file.
    ///
    /// Upsert on `(job_id, file_name)`: re-recording replaces the key and
    /// never adds a second row.
    async fn record(&self, file: &OutputFile) -> Result<()>;

    /// Number of files recorded for a job
    async fn count_for_job(&self, job_id: JobId) -> Result<i64>;

    /// All files of a job, ordered by file name
    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<OutputFile>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryOutputFileRepository {
        files: Mutex<BTreeMap<(JobId, String), OutputFile>>,
    }

    impl InMemoryOutputFileRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl OutputFileRepository for InMemoryOutputFileRepository {
        async fn record(&self, file: &OutputFile) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert((file.job_id, file.file_name.clone()), file.clone());
            Ok(())
        }

        async fn count_for_job(&self, job_id: JobId) -> Result<i64> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .keys()
                .filter(|(id, _)| *id == job_id)
                .count() as i64)
        }

        async fn find_by_job(&self, job_id: JobId) -> Result<Vec<OutputFile>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .values()
                .filter(|f| f.job_id == job_id)
                .cloned()
                .collect())
        }
    }
}
