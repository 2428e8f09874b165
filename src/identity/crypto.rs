//! Node key material
//!
//! # Algorithms
//!
//! - **Signing key**: Ed25519
//! - **Seed derivation**: Argon2id over the configured secret, salted with
//!   the passphrase so one secret can back several node identities
//!
//! Argon2id parameters:
//! - 64 MB memory
//! - 3 iterations
//! - 4 parallelism threads

use argon2::{Algorithm, Argon2, Params, Version};
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::types::{Result, VaultError};

// =============================================================================
// Constants
// =============================================================================

/// Argon2id memory cost in KiB (64 MB)
pub const ARGON2_MEMORY_KB: u32 = 65536;

/// Argon2id iteration count
pub const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism (threads)
pub const ARGON2_PARALLELISM: u32 = 4;

/// Salt length for seed derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Domain separator mixed into the derivation salt
const SALT_DOMAIN: &[u8] = b"vault-node/did-identity/v1";

// =============================================================================
// Key Generation
// =============================================================================

/// Generate a fresh Ed25519 signing key from the OS RNG
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Derive the node signing key from its secret and passphrase.
///
/// Deterministic: the same secret and passphrase always yield the same key,
/// and therefore the same DID.
pub fn derive_signing_key(secret: &str, passphrase: &str) -> Result<SigningKey> {
    if secret.is_empty() {
        return Err(VaultError::Config("DID secret must not be empty".into()));
    }

    let params = Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| VaultError::Internal(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut seed = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(secret.as_bytes(), &derivation_salt(passphrase), &mut seed[..])
        .map_err(|e| VaultError::Internal(format!("Key derivation failed: {e}")))?;

    Ok(SigningKey::from_bytes(&seed))
}

fn derivation_salt(passphrase: &str) -> [u8; SALT_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(SALT_DOMAIN);
    hasher.update(passphrase.as_bytes());
    let digest = hasher.finalize();

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest[..SALT_LEN]);
    salt
}

// =============================================================================
// Signing
// =============================================================================

pub fn sign_payload(signing_key: &SigningKey, payload: &[u8]) -> Signature {
    signing_key.sign(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_signing_key("node-secret", "pass").unwrap();
        let b = derive_signing_key("node-secret", "pass").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());

        let other_pass = derive_signing_key("node-secret", "other").unwrap();
        assert_ne!(a.to_bytes(), other_pass.to_bytes());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            derive_signing_key("", "pass"),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_salt_depends_on_passphrase() {
        assert_ne!(derivation_salt("a"), derivation_salt("b"));
        assert_eq!(derivation_salt(""), derivation_salt(""));
    }

    #[test]
    fn test_signing() {
        let key = generate_signing_key();
        let signature = sign_payload(&key, b"challenge");
        assert!(key.verifying_key().verify(b"challenge", &signature).is_ok());
        assert!(key.verifying_key().verify(b"tampered", &signature).is_err());
    }
}
