//! SLIP-10 hierarchical derivation of Ed25519 keys.
//!
//! Only hardened derivation exists for Ed25519, so every segment of a
//! [`Bip44`] chain is derived hardened.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use tessera_types::{Bip44, KeyPair, PrivateKey};
use zeroize::Zeroizing;

use crate::keys::keypair_from_private;
use crate::mnemonic::MnemonicError;

type HmacSha512 = Hmac<Sha512>;

const CURVE_KEY: &[u8] = b"ed25519 seed";
const HARDENED: u32 = 0x8000_0000;

struct ExtendedKey {
    key: Zeroizing<[u8; 32]>,
    chain_code: Zeroizing<[u8; 32]>,
}

impl ExtendedKey {
    fn from_hmac(key: &[u8], data: &[&[u8]]) -> Result<Self, MnemonicError> {
        let mut mac = HmacSha512::new_from_slice(key)
            .map_err(|e| MnemonicError::DerivationFailed(e.to_string()))?;
        for part in data {
            mac.update(part);
        }
        let mut out = Zeroizing::new([0u8; 64]);
        out.copy_from_slice(&mac.finalize().into_bytes());
        let mut extended = Self {
            key: Zeroizing::new([0u8; 32]),
            chain_code: Zeroizing::new([0u8; 32]),
        };
        extended.key.copy_from_slice(&out[..32]);
        extended.chain_code.copy_from_slice(&out[32..]);
        Ok(extended)
    }

    fn master(seed: &[u8]) -> Result<Self, MnemonicError> {
        Self::from_hmac(CURVE_KEY, &[seed])
    }

    fn child(&self, index: u32) -> Result<Self, MnemonicError> {
        let index = (index | HARDENED).to_be_bytes();
        Self::from_hmac(&self.chain_code[..], &[&[0u8], &self.key[..], &index])
    }
}

/// Derive the key pair at `chain` from a BIP39 seed.
pub fn derive_keypair(seed: &[u8], chain: &Bip44) -> Result<KeyPair, MnemonicError> {
    let mut node = ExtendedKey::master(seed)?;
    for segment in chain.segments() {
        node = node.child(segment)?;
    }
    Ok(keypair_from_private(PrivateKey(*node.key)))
}
