// Hybrid payload encryption
// AES-256-GCM for content, RSA-OAEP(SHA-256) to wrap the per-payload key.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bulkex_core::port::{check_plaintext_size, Encrypted, EncryptionError, Encryptor};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

/// Encrypt `plaintext` under a fresh content key.
///
/// Output layout is `nonce | ciphertext | tag`; the content key is wrapped
/// with RSA-OAEP(SHA-256) using `label` as the OAEP label.
pub fn encrypt_bytes(
    public_key: &RsaPublicKey,
    plaintext: &[u8],
    label: &str,
) -> Result<Encrypted, EncryptionError> {
    check_plaintext_size(plaintext.len())?;

    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| EncryptionError::Cipher(format!("failed to create cipher: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| EncryptionError::Cipher(format!("encryption failed: {e}")))?;

    let mut ciphertext = Vec::with_capacity(NONCE_SIZE + sealed.len());
    ciphertext.extend_from_slice(&nonce_bytes);
    ciphertext.extend_from_slice(&sealed);

    let wrapped_key = public_key
        .encrypt(&mut OsRng, Oaep::new_with_label::<Sha256, _>(label), &key)
        .map_err(|e| EncryptionError::Cipher(format!("key wrapping failed: {e}")))?;

    Ok(Encrypted {
        ciphertext,
        wrapped_key,
    })
}

/// Inverse of [`encrypt_bytes`]
pub fn decrypt_bytes(
    private_key: &RsaPrivateKey,
    ciphertext: &[u8],
    wrapped_key: &[u8],
    label: &str,
) -> Result<Vec<u8>, EncryptionError> {
    if ciphertext.len() < NONCE_SIZE {
        return Err(EncryptionError::Cipher("ciphertext shorter than nonce".to_string()));
    }

    let key = private_key
        .decrypt(Oaep::new_with_label::<Sha256, _>(label), wrapped_key)
        .map_err(|e| EncryptionError::Cipher(format!("key unwrapping failed: {e}")))?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| EncryptionError::Cipher(format!("failed to create cipher: {e}")))?;

    let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|e| EncryptionError::Cipher(format!("decryption failed: {e}")))
}

/// Parse a PEM public key, SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`)
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, EncryptionError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| EncryptionError::KeyUnavailable(format!("invalid public key: {e}")))
}

/// Encryptor backed by RSA public keys.
///
/// Organizations without a registered key fall back to the default key.
#[derive(Default)]
pub struct RsaEncryptor {
    default_key: Option<RsaPublicKey>,
    org_keys: HashMap<String, RsaPublicKey>,
}

impl RsaEncryptor {
    pub fn new(default_key: RsaPublicKey) -> Self {
        Self {
            default_key: Some(default_key),
            org_keys: HashMap::new(),
        }
    }

    /// Load the default key from a PEM file
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, EncryptionError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            EncryptionError::KeyUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(Self::new(parse_public_key_pem(&pem)?))
    }

    pub fn with_org_key(mut self, org_id: impl Into<String>, key: RsaPublicKey) -> Self {
        self.org_keys.insert(org_id.into(), key);
        self
    }

    fn key_for(&self, org_id: &str) -> Result<&RsaPublicKey, EncryptionError> {
        self.org_keys
            .get(org_id)
            .or(self.default_key.as_ref())
            .ok_or_else(|| EncryptionError::KeyUnavailable(format!("no key for {org_id}")))
    }
}

impl Encryptor for RsaEncryptor {
    fn encrypt(
        &self,
        org_id: &str,
        plaintext: &[u8],
        label: &str,
    ) -> Result<Encrypted, EncryptionError> {
        let key = self.key_for(org_id)?;
        let encrypted = encrypt_bytes(key, plaintext, label)?;
        debug!(
            org_id = %org_id,
            label = %label,
            bytes = encrypted.ciphertext.len(),
            "Payload encrypted"
        );
        Ok(encrypted)
    }
}
