//! Argon2id encrypted keystore for arbitrary secret bytes.
//!
//! Used for the vault's seed file and for backup files:
//! 1. Argon2id derives a 32-byte encryption key from the password + random salt
//! 2. AES-256-GCM encrypts the plaintext with a random nonce
//! 3. The result is stored as a JSON document carrying every parameter needed to decrypt

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroizing;

const KEYSTORE_VERSION: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Salt length in bytes.
const SALT_LEN: usize = 32;
/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("unsupported keystore version: {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid keystore field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,

    #[error("invalid keystore JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("keystore I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The top-level keystore file structure, serializable to/from JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    pub crypto: KeystoreCrypto,
}

/// The crypto section of the keystore, containing all encryption parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext.
    pub ciphertext: String,
}

/// Argon2id cost parameters, recorded in the file so decryption needs only the password.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Cheap parameters for tests. Never use these for real secrets.
    pub const fn testing() -> Self {
        Self {
            memory: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 iterations, 1 lane.
    fn default() -> Self {
        Self {
            memory: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Encrypt `plaintext` with a password using Argon2id + AES-256-GCM.
pub fn encrypt_keystore(
    plaintext: &[u8],
    password: &str,
    kdf_params: KdfParams,
) -> Result<KeystoreFile, KeystoreError> {
    let mut rng = rand::thread_rng();

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let derived_key = derive_key(password, &salt, &kdf_params)?;
    let cipher =
        Aes256Gcm::new_from_slice(&derived_key[..]).map_err(|_| KeystoreError::Encryption)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| KeystoreError::Encryption)?;

    Ok(KeystoreFile {
        version: KEYSTORE_VERSION,
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            kdf: "argon2id".to_string(),
            kdf_params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

/// Decrypt a keystore with the given password.
pub fn decrypt_keystore(
    keystore: &KeystoreFile,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    if keystore.version != KEYSTORE_VERSION {
        return Err(KeystoreError::UnsupportedVersion(keystore.version));
    }
    if keystore.crypto.cipher != "aes-256-gcm" {
        return Err(KeystoreError::UnsupportedAlgorithm(format!(
            "cipher {}",
            keystore.crypto.cipher
        )));
    }
    if keystore.crypto.kdf != "argon2id" {
        return Err(KeystoreError::UnsupportedAlgorithm(format!(
            "kdf {}",
            keystore.crypto.kdf
        )));
    }

    let salt = decode_field("salt", &keystore.crypto.salt)?;
    let nonce_bytes = decode_field("nonce", &keystore.crypto.nonce)?;
    let ciphertext = decode_field("ciphertext", &keystore.crypto.ciphertext)?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(KeystoreError::InvalidField {
            field: "nonce",
            reason: format!("expected {} bytes, got {}", NONCE_LEN, nonce_bytes.len()),
        });
    }

    let derived_key = derive_key(password, &salt, &keystore.crypto.kdf_params)?;
    let cipher =
        Aes256Gcm::new_from_slice(&derived_key[..]).map_err(|_| KeystoreError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| KeystoreError::Decryption)?;

    Ok(Zeroizing::new(plaintext))
}

/// Save a keystore to a JSON file.
pub fn save_keystore(keystore: &KeystoreFile, path: &Path) -> Result<(), KeystoreError> {
    let json = serde_json::to_string_pretty(keystore)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a keystore from a JSON file.
pub fn load_keystore(path: &Path) -> Result<KeystoreFile, KeystoreError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn derive_key(
    password: &str,
    salt: &[u8],
    kdf_params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let params = Params::new(
        kdf_params.memory,
        kdf_params.iterations,
        kdf_params.parallelism,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| KeystoreError::Kdf(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output[..])
        .map_err(|e| KeystoreError::Kdf(e.to_string()))?;

    Ok(output)
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, KeystoreError> {
    hex::decode(value).map_err(|e| KeystoreError::InvalidField {
        field,
        reason: e.to_string(),
    })
}
