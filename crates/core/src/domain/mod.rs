// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod manifest;
pub mod outcome;
pub mod output_file;
pub mod resource_type;
pub mod unit;

// Re-exports
pub use error::DomainError;
pub use job::{derive_effective_status, Job, JobId, JobStatus, OrgId, UserId};
pub use manifest::{Manifest, ManifestEntry};
pub use outcome::{Coding, CodeableConcept, Issue, IssueSeverity, IssueType, OperationOutcome};
pub use output_file::OutputFile;
pub use resource_type::ResourceType;
pub use unit::{Delivery, ExportUnit, ERROR_FILE_SUFFIX, NDJSON_EXTENSION};
