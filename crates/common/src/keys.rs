//! Signing primitives the verifier delegates to
//!
//! Transactions are signed over a SHA-256 digest of their canonical
//! pre-image with Ed25519. The core never generates keys; callers hold
//! the signing key and only hand over signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::hashes::PubKeyHash;

/// Hash a raw public key into the output-locking identity
pub fn hash_pub_key(pub_key: &[u8]) -> PubKeyHash {
    PubKeyHash::from_bytes(Sha256::digest(pub_key).into())
}

/// Sign pre-image bytes with the given key
pub fn sign(signing_key: &SigningKey, data: &[u8]) -> Vec<u8> {
    signing_key.sign(data).to_bytes().to_vec()
}

/// Verify a signature over pre-image bytes against a raw public key
pub fn verify(pub_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let key_bytes: [u8; 32] = pub_key
        .try_into()
        .map_err(|_| Error::InvalidPublicKey(format!("expected 32 bytes, got {}", pub_key.len())))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::InvalidSignature(format!("expected 64 bytes, got {}", signature.len())))?;
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(data, &signature)
        .map_err(|_| Error::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = test_key(7);
        let data = b"data to sign";
        let signature = sign(&key, data);
        verify(key.verifying_key().as_bytes(), data, &signature).unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let key = test_key(7);
        let other = test_key(8);
        let signature = sign(&key, b"payload");
        let err = verify(other.verifying_key().as_bytes(), b"payload", &signature).unwrap_err();
        assert_eq!(err, Error::SignatureMismatch);
    }

    #[test]
    fn test_verify_rejects_tampered_data() {
        let key = test_key(7);
        let signature = sign(&key, b"payload");
        assert!(verify(key.verifying_key().as_bytes(), b"other", &signature).is_err());
    }
}
