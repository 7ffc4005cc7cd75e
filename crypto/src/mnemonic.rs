//! BIP39 mnemonic generation, validation and seed derivation.
//!
//! Mnemonics are 24 words (256-bit entropy). The seed is the standard BIP39
//! PBKDF2 output with an empty passphrase and is returned in a zeroizing buffer.

use bip39::Mnemonic;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Errors arising from mnemonic operations.
#[derive(Debug, Error)]
pub enum MnemonicError {
    #[error("invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Generate a new 24-word BIP39 mnemonic from 256-bit entropy.
pub fn generate_mnemonic() -> Result<Zeroizing<String>, MnemonicError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| MnemonicError::DerivationFailed(e.to_string()));
    entropy.zeroize();
    Ok(Zeroizing::new(mnemonic?.to_string()))
}

/// Validate that a phrase is a well-formed BIP39 mnemonic with a correct checksum.
pub fn validate_mnemonic(mnemonic: &str) -> Result<(), MnemonicError> {
    Mnemonic::parse_normalized(mnemonic)
        .map(|_| ())
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))
}

/// Derive the 64-byte BIP39 seed from a mnemonic phrase.
pub fn mnemonic_to_seed(mnemonic: &str) -> Result<Zeroizing<[u8; 64]>, MnemonicError> {
    let parsed = Mnemonic::parse_normalized(mnemonic)
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(parsed.to_seed_normalized("")))
}
