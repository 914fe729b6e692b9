// Encryptor Port
// Hybrid encryption of a payload for the organization that requested it.

use thiserror::Error;

/// Largest plaintext accepted (64 GiB)
pub const MAX_PLAINTEXT_BYTES: u64 = 64 * 1024 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("no public key available: {0}")]
    KeyUnavailable(String),

    #[error("cipher failure: {0}")]
    Cipher(String),
}

/// Output of one encryption: `nonce | ciphertext | tag` plus the wrapped content key
#[derive(Debug, Clone)]
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
}

pub trait Encryptor: Send + Sync {
    /// Encrypt `plaintext` for `org_id`. `label` binds the wrapped key to a file name.
    fn encrypt(
        &self,
        org_id: &str,
        plaintext: &[u8],
        label: &str,
    ) -> std::result::Result<Encrypted, EncryptionError>;
}

/// Size guard shared by implementations
pub fn check_plaintext_size(len: usize) -> std::result::Result<(), EncryptionError> {
    let size = len as u64;
    if size > MAX_PLAINTEXT_BYTES {
        return Err(EncryptionError::PayloadTooLarge {
            size,
            max: MAX_PLAINTEXT_BYTES,
        });
    }
    Ok(())
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Prefixes plaintext with `enc:` and uses the label bytes as the wrapped key
    #[derive(Default)]
    pub struct MockEncryptor {
        fail: AtomicBool,
    }

    impl MockEncryptor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl Encryptor for MockEncryptor {
        fn encrypt(
            &self,
            _org_id: &str,
            plaintext: &[u8],
            label: &str,
        ) -> std::result::Result<Encrypted, EncryptionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(EncryptionError::Cipher("mock failure".to_string()));
            }
            check_plaintext_size(plaintext.len())?;
            let mut ciphertext = b"enc:".to_vec();
            ciphertext.extend_from_slice(plaintext);
            Ok(Encrypted {
                ciphertext,
                wrapped_key: label.as_bytes().to_vec(),
            })
        }
    }
}
