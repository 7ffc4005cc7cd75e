//! Ledger address derivation from public keys.

use tessera_types::{Address, PublicKey};

use crate::hash::public_key_hash;

/// The Ed25519 address controlled by `public_key`.
pub fn ed25519_address(public_key: &PublicKey) -> Address {
    Address::Ed25519(public_key_hash(public_key))
}

/// Whether `public_key` is the key behind `address`.
pub fn key_matches_address(public_key: &PublicKey, address: &Address) -> bool {
    matches!(address, Address::Ed25519(hash) if *hash == public_key_hash(public_key))
}
