//! Cryptographic primitives for the Tessera wallet.
//!
//! - **Ed25519** signing and verification of transaction essences
//! - **Blake2b-256** hashing for addresses and identifiers
//! - **BIP39** mnemonics and **SLIP-10** key derivation along BIP44 chains

pub mod address;
pub mod hash;
pub mod keys;
pub mod mnemonic;
pub mod sign;
pub mod slip10;

pub use address::{ed25519_address, key_matches_address};
pub use hash::{blake2b_256, public_key_hash};
pub use keys::{generate_keypair, keypair_from_private, public_from_private};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic, MnemonicError};
pub use sign::{sign_message, signature_unlock, verify_signature, verify_unlock};
pub use slip10::derive_keypair;
