// Output File Record

use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::unit::ERROR_FILE_SUFFIX;

/// One published (possibly encrypted) payload file of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub job_id: JobId,
    pub file_name: String,
    /// RSA-wrapped content key, empty when encryption is off
    pub encrypted_key: Vec<u8>,
}

impl OutputFile {
    pub fn new(job_id: JobId, file_name: impl Into<String>, encrypted_key: Vec<u8>) -> Self {
        Self {
            job_id,
            file_name: file_name.into(),
            encrypted_key,
        }
    }

    pub fn is_error_file(&self) -> bool {
        self.file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_name)
            .ends_with(ERROR_FILE_SUFFIX)
    }
}
