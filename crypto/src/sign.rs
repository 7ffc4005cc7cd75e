//! Ed25519 signing of transaction essences.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use tessera_types::{PrivateKey, PublicKey, Signature, SignatureUnlock};

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `false` for malformed public keys as well as for bad signatures.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Produce the signature unlock for an essence hash.
pub fn signature_unlock(essence_hash: &[u8; 32], private_key: &PrivateKey, public_key: PublicKey) -> SignatureUnlock {
    SignatureUnlock {
        public_key,
        signature: sign_message(essence_hash, private_key),
    }
}

/// Check a signature unlock against the essence hash it claims to sign.
pub fn verify_unlock(essence_hash: &[u8; 32], unlock: &SignatureUnlock) -> bool {
    verify_signature(essence_hash, &unlock.signature, &unlock.public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_private};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let msg = b"essence hash stand-in";
        let sig = sign_message(msg, &kp.private);
        assert!(verify_signature(msg, &sig, &kp.public));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"correct message", &kp.private);
        assert!(!verify_signature(b"wrong message", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = generate_keypair();
        let kp2 = generate_keypair();
        let sig = sign_message(b"test", &kp1.private);
        assert!(!verify_signature(b"test", &sig, &kp2.public));
    }

    #[test]
    fn signature_deterministic() {
        let kp = keypair_from_private(PrivateKey([99u8; 32]));
        let sig1 = sign_message(b"same", &kp.private);
        let sig2 = sign_message(b"same", &kp.private);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair();
        let sig = sign_message(b"test", &kp.private);
        assert!(!verify_signature(b"test", &sig, &PublicKey([0xFF; 32])));
    }

    #[test]
    fn unlock_roundtrip() {
        let kp = generate_keypair();
        let hash = [3u8; 32];
        let unlock = signature_unlock(&hash, &kp.private, kp.public);
        assert!(verify_unlock(&hash, &unlock));
        assert!(!verify_unlock(&[4u8; 32], &unlock));
    }
}
