// Bulkex Infrastructure - System Adapters
// Implements: Encryptor, FileStore, DataSource

pub mod data_source;
pub mod encryption;
pub mod file_store;

pub use data_source::HttpDataSource;
pub use encryption::{decrypt_bytes, encrypt_bytes, RsaEncryptor};
pub use file_store::LocalFileStore;
