// Port Layer - Interfaces for external dependencies

pub mod data_source;
pub mod encryptor;
pub mod file_store;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod output_file_repository;
pub mod population_repository;
pub mod time_provider;
pub mod work_queue;

// Re-exports
pub use data_source::{DataSource, FetchError};
pub use encryptor::{check_plaintext_size, Encrypted, EncryptionError, Encryptor, MAX_PLAINTEXT_BYTES};
pub use file_store::FileStore;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use output_file_repository::OutputFileRepository;
pub use population_repository::PopulationRepository;
pub use time_provider::TimeProvider;
pub use work_queue::{DeliveryState, WorkQueue};
