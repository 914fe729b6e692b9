// Completed-job manifest

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::job::Job;
use super::outcome::OperationOutcome;
use super::output_file::OutputFile;
use super::resource_type::ResourceType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "transactionTime")]
    pub transaction_time: String,
    pub request: String,
    #[serde(rename = "requiresAccessToken")]
    pub requires_access_token: bool,
    pub output: Vec<ManifestEntry>,
    pub error: Vec<ManifestEntry>,
    /// File name -> hex-encoded wrapped key
    #[serde(rename = "KeyMap")]
    pub key_map: BTreeMap<String, String>,
}

impl Manifest {
    /// Build the manifest of a completed job from its output records.
    ///
    /// `transaction_time` is RFC 3339; download URLs are
    /// `{data_base_url}/{job_id}/{file_name}`.
    pub fn build(
        job: &Job,
        resource_type: ResourceType,
        files: &[OutputFile],
        data_base_url: &str,
        transaction_time: String,
    ) -> Self {
        let base = data_base_url.trim_end_matches('/');
        let mut output = Vec::new();
        let mut error = Vec::new();
        let mut key_map = BTreeMap::new();

        for file in files {
            let url = format!("{}/{}/{}", base, job.id, file.file_name);
            if file.is_error_file() {
                error.push(ManifestEntry {
                    resource_type: OperationOutcome::RESOURCE_TYPE.to_string(),
                    url,
                });
            } else {
                output.push(ManifestEntry {
                    resource_type: resource_type.as_str().to_string(),
                    url,
                });
            }
            key_map.insert(file.file_name.clone(), hex::encode(&file.encrypted_key));
        }

        Self {
            transaction_time,
            request: job.request_url.clone(),
            requires_access_token: true,
            output,
            error,
            key_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_splits_output_and_error_files() {
        let mut job = Job::new("A0001", "user-1", "https://h/api/v1/Patient/$export", 0);
        job.id = 42;
        let files = vec![
            OutputFile::new(42, "A0001-0.ndjson", vec![0xde, 0xad]),
            OutputFile::new(42, "A0001-0-error.ndjson", vec![0x01]),
            OutputFile::new(42, "A0001-1.ndjson", vec![]),
        ];

        let manifest = Manifest::build(
            &job,
            ResourceType::Patient,
            &files,
            "https://h/data/",
            "2026-01-01T00:00:00Z".to_string(),
        );

        assert_eq!(manifest.output.len(), 2);
        assert_eq!(manifest.output[0].url, "https://h/data/42/A0001-0.ndjson");
        assert_eq!(manifest.output[0].resource_type, "Patient");
        assert_eq!(manifest.error.len(), 1);
        assert_eq!(manifest.error[0].resource_type, "OperationOutcome");
        assert_eq!(manifest.key_map["A0001-0.ndjson"], "dead");
        assert_eq!(manifest.key_map["A0001-1.ndjson"], "");
        assert!(manifest.requires_access_token);
        assert_eq!(manifest.request, "https://h/api/v1/Patient/$export");
    }
}
