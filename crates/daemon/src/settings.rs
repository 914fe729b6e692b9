//! Daemon settings
//!
//! Every field comes from a `BULKEX_`-prefixed environment variable and has
//! a default, e.g. `BULKEX_MAX_BATCH_SIZE=5000`.

use anyhow::{anyhow, bail, Context, Result};
use bulkex_api_http::AuthConfig;
use bulkex_core::application::worker::constants;
use bulkex_core::application::{ExportConfig, StatusConfig};
use bulkex_core::domain::ResourceType;
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "BULKEX";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_job_ttl_hours")]
    pub job_ttl_hours: i64,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    #[serde(default = "default_payload_dir")]
    pub payload_dir: String,

    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_max_unit_attempts")]
    pub max_unit_attempts: i32,
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: i64,

    #[serde(default = "default_true")]
    pub encryption_enabled: bool,
    /// Comma separated resource type names
    #[serde(default)]
    pub encryption_disabled_types: String,
    #[serde(default)]
    pub enable_patient_export: bool,
    #[serde(default)]
    pub enable_coverage_export: bool,
    #[serde(default)]
    pub public_key_file: Option<String>,

    #[serde(default = "default_data_base_url")]
    pub data_base_url: String,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_fhir_source_url")]
    pub fhir_source_url: String,

    /// `rsa` or `hmac`
    #[serde(default = "default_auth_provider")]
    pub auth_provider: String,
    #[serde(default)]
    pub jwt_private_key_file: Option<String>,
    #[serde(default)]
    pub jwt_public_key_file: Option<String>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    #[serde(default = "default_archive_interval_hours")]
    pub archive_interval_hours: u64,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_database_url() -> String { "sqlite://bulkex.db".to_string() }
fn default_http_port() -> u16 { 3000 }
fn default_max_batch_size() -> usize { bulkex_core::application::config::DEFAULT_MAX_BATCH_SIZE }
fn default_job_ttl_hours() -> i64 { bulkex_core::application::config::DEFAULT_JOB_TTL_HOURS }
fn default_staging_dir() -> String { "~/.bulkex/staging".to_string() }
fn default_payload_dir() -> String { "~/.bulkex/payload".to_string() }
fn default_worker_pool_size() -> usize { 4 }
fn default_max_unit_attempts() -> i32 { constants::DEFAULT_MAX_UNIT_ATTEMPTS }
fn default_visibility_timeout_secs() -> i64 { constants::DEFAULT_VISIBILITY_TIMEOUT_MS / 1000 }
fn default_true() -> bool { true }
fn default_data_base_url() -> String { "http://localhost:3000/data".to_string() }
fn default_public_base_url() -> String { "http://localhost:3000".to_string() }
fn default_fhir_source_url() -> String { "http://localhost:8080/fhir".to_string() }
fn default_auth_provider() -> String { "hmac".to_string() }
fn default_token_ttl_minutes() -> i64 { 60 }
fn default_archive_interval_hours() -> u64 { 24 }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_source(None)
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            bail!("BULKEX_WORKER_POOL_SIZE must be at least 1");
        }
        if self.max_unit_attempts < 1 {
            bail!("BULKEX_MAX_UNIT_ATTEMPTS must be at least 1");
        }
        if self.visibility_timeout_secs <= 0 {
            bail!("BULKEX_VISIBILITY_TIMEOUT_SECS must be positive");
        }
        if self.token_ttl_minutes <= 0 {
            bail!("BULKEX_TOKEN_TTL_MINUTES must be positive");
        }
        Ok(())
    }

    pub fn export_config(&self) -> Result<ExportConfig> {
        let mut enabled_resource_types = vec![ResourceType::ExplanationOfBenefit];
        if self.enable_patient_export {
            enabled_resource_types.push(ResourceType::Patient);
        }
        if self.enable_coverage_export {
            enabled_resource_types.push(ResourceType::Coverage);
        }

        let encryption_disabled_types = self
            .encryption_disabled_types
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<ResourceType>()
                    .map_err(|e| anyhow!("BULKEX_ENCRYPTION_DISABLED_TYPES: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let config = ExportConfig {
            max_batch_size: self.max_batch_size,
            enabled_resource_types,
            encryption_enabled: self.encryption_enabled,
            encryption_disabled_types,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn status_config(&self) -> Result<StatusConfig> {
        Ok(StatusConfig::new(
            self.job_ttl_hours,
            self.data_base_url.trim_end_matches('/'),
        )?)
    }

    pub fn job_ttl_ms(&self) -> i64 {
        self.job_ttl_hours.saturating_mul(60 * 60 * 1000)
    }

    pub fn staging_dir(&self) -> String {
        shellexpand::tilde(&self.staging_dir).into_owned()
    }

    pub fn payload_dir(&self) -> String {
        shellexpand::tilde(&self.payload_dir).into_owned()
    }

    pub fn public_key_file(&self) -> Option<String> {
        self.public_key_file
            .as_deref()
            .map(|p| shellexpand::tilde(p).into_owned())
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_minutes * 60
    }

    /// Key material for the configured token provider
    pub fn auth_config(&self) -> Result<AuthConfig> {
        match self.auth_provider.to_ascii_lowercase().as_str() {
            "rsa" => {
                let private_key_pem = read_key_file(
                    self.jwt_private_key_file.as_deref(),
                    "BULKEX_JWT_PRIVATE_KEY_FILE",
                )?;
                let public_key_pem = read_key_file(
                    self.jwt_public_key_file.as_deref(),
                    "BULKEX_JWT_PUBLIC_KEY_FILE",
                )?;
                Ok(AuthConfig::Rsa {
                    private_key_pem,
                    public_key_pem,
                })
            }
            "hmac" => {
                let secret = self
                    .jwt_secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| anyhow!("BULKEX_JWT_SECRET is required for the hmac provider"))?;
                Ok(AuthConfig::Hmac {
                    secret: secret.as_bytes().to_vec(),
                })
            }
            other => bail!("unknown BULKEX_AUTH_PROVIDER {:?} (expected rsa or hmac)", other),
        }
    }
}

fn read_key_file(path: Option<&str>, var: &str) -> Result<Vec<u8>> {
    let path = path.ok_or_else(|| anyhow!("{} is required for the rsa provider", var))?;
    let path = shellexpand::tilde(path).into_owned();
    std::fs::read(&path).with_context(|| format!("cannot read {} ({})", var, path))
}
