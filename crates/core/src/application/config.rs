// Application configuration (validated values, no I/O)

use crate::domain::ResourceType;
use crate::error::{AppError, Result};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_JOB_TTL_HOURS: i64 = 24;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Submission and worker settings
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Maximum members per unit
    pub max_batch_size: usize,
    pub enabled_resource_types: Vec<ResourceType>,
    pub encryption_enabled: bool,
    /// Types exported in plaintext even when encryption is on
    pub encryption_disabled_types: Vec<ResourceType>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            enabled_resource_types: vec![ResourceType::ExplanationOfBenefit],
            encryption_enabled: true,
            encryption_disabled_types: Vec::new(),
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(AppError::Config("max_batch_size must be positive".to_string()));
        }
        if self.enabled_resource_types.is_empty() {
            return Err(AppError::Config(
                "at least one resource type must be exportable".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self, resource_type: ResourceType) -> bool {
        self.enabled_resource_types.contains(&resource_type)
    }

    pub fn should_encrypt(&self, resource_type: ResourceType) -> bool {
        self.encryption_enabled && !self.encryption_disabled_types.contains(&resource_type)
    }
}

/// Status reporting settings
#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// How long a completed job's output is served, in ms
    pub job_ttl_ms: i64,
    /// Prefix of download URLs in the manifest
    pub data_base_url: String,
}

impl StatusConfig {
    pub fn new(job_ttl_hours: i64, data_base_url: impl Into<String>) -> Result<Self> {
        if job_ttl_hours < 0 {
            return Err(AppError::Config(format!(
                "job TTL must be non-negative, got {} hours",
                job_ttl_hours
            )));
        }
        Ok(Self {
            job_ttl_ms: job_ttl_hours.saturating_mul(HOUR_MS),
            data_base_url: data_base_url.into(),
        })
    }
}
