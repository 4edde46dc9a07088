use bitcoin::secp256k1::{ecdsa::Signature, Message, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::types::{DigestKey, Secret};

/// Domain-separation tag mixed into every derived secret so this system's
/// secrets can never collide with another protocol's signatures over the
/// same digest key, even if a user reuses one digest key across services.
const SECRET_DOMAIN_TAG: &str = "atomic-swap-htlc/secret-v1";

impl DigestKey {
    /// Validates `1 <= k < n` for the secp256k1 group order, per §3's invariant.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CoreError> {
        SecretKey::from_slice(&bytes)
            .map_err(|e| CoreError::InvalidRequest(format!("invalid digest key: {e}")))?;
        Ok(DigestKey(bytes))
    }

    /// Deterministically derives the secret for a given nonce:
    /// `secret = SHA256(sign(digest_key, domain_tag || nonce))`.
    ///
    /// Because ECDSA signing here is used purely as a keyed PRF (not for an
    /// on-chain signature), the resulting secret is reproducible by the user
    /// from the digest key and nonce alone, with no server-side storage.
    pub fn derive_secret(&self, nonce: u64) -> Result<Secret, CoreError> {
        let secp = Secp256k1::signing_only();
        let secret_key = SecretKey::from_slice(&self.0)
            .map_err(|e| CoreError::InvalidRequest(format!("invalid digest key: {e}")))?;

        let mut preimage = Vec::with_capacity(SECRET_DOMAIN_TAG.len() + 8);
        preimage.extend_from_slice(SECRET_DOMAIN_TAG.as_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());

        let digest = Sha256::digest(&preimage);
        let message = Message::from_digest_slice(&digest)
            .map_err(|e| CoreError::InvalidRequest(format!("invalid signing digest: {e}")))?;

        let signature: Signature = secp.sign_ecdsa(&message, &secret_key);
        let signed = Sha256::digest(signature.serialize_compact());

        let mut out = [0u8; 32];
        out.copy_from_slice(&signed);
        Ok(Secret(out))
    }
}

/// BIP340-style tagged hash for domain separation, used wherever this
/// workspace needs a keyed hash that must never collide with an unrelated
/// tag's output (e.g. a future second HTLC family sharing the same digest
/// key infrastructure).
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> DigestKey {
        let mut bytes = [byte; 32];
        bytes[0] = 1; // avoid the all-zero key, which is not a valid secp256k1 scalar
        DigestKey::from_bytes(bytes).unwrap()
    }

    #[test]
    fn same_key_and_nonce_reproduce_the_same_secret() {
        let k = key(7);
        let s1 = k.derive_secret(42).unwrap();
        let s2 = k.derive_secret(42).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn different_nonces_yield_different_secrets() {
        let k = key(7);
        let s1 = k.derive_secret(1).unwrap();
        let s2 = k.derive_secret(2).unwrap();
        assert_ne!(s1, s2);
    }

    #[test]
    fn different_keys_yield_different_secrets_for_the_same_nonce() {
        let k1 = key(7);
        let k2 = key(9);
        let s1 = k1.derive_secret(1).unwrap();
        let s2 = k2.derive_secret(1).unwrap();
        assert_ne!(s1, s2);
    }

    #[test]
    fn secret_hash_invariant_holds() {
        let k = key(3);
        let secret = k.derive_secret(5).unwrap();
        let hash = secret.hash();
        assert!(hash.matches(&secret));
    }

    #[test]
    fn zero_digest_key_is_rejected() {
        assert!(DigestKey::from_bytes([0u8; 32]).is_err());
    }

    #[test]
    fn tagged_hash_is_domain_separated() {
        let a = tagged_hash("tag-a", b"data");
        let b = tagged_hash("tag-b", b"data");
        assert_ne!(a, b);
    }
}
