//! Blake2b-256 hashing of keys and arbitrary data.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use tessera_types::PublicKey;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    Blake2b256::digest(data).into()
}

/// The hash that identifies an Ed25519 key on the ledger.
pub fn public_key_hash(public_key: &PublicKey) -> [u8; 32] {
    blake2b_256(public_key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        assert_eq!(blake2b_256(b"tessera"), blake2b_256(b"tessera"));
        assert_ne!(blake2b_256(b"tessera"), blake2b_256(b"tesserae"));
    }

    #[test]
    fn blake2b_empty_is_not_zero() {
        assert_ne!(blake2b_256(b""), [0u8; 32]);
    }

    #[test]
    fn public_key_hash_matches_plain_hash() {
        let key = PublicKey([7u8; 32]);
        assert_eq!(public_key_hash(&key), blake2b_256(&[7u8; 32]));
    }
}
