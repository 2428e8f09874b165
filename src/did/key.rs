//! Ed25519 key encodings used in DID documents
//!
//! - `publicKeyMultibase`: `z` + base58btc(0xed 0x01 || key)
//! - `publicKeyBase58`: base58btc(key)
//! - `did:key:<multibase>` for self-describing identities

use ed25519_dalek::VerifyingKey;

use super::DidError;

/// Multicodec prefix for an Ed25519 public key
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Encode a verifying key as a base58btc multibase string
pub fn encode_multibase_ed25519(key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(34);
    bytes.extend_from_slice(&ED25519_MULTICODEC);
    bytes.extend_from_slice(key.as_bytes());
    format!("z{}", bs58::encode(bytes).into_string())
}

/// Decode a base58btc multibase Ed25519 key
pub fn decode_multibase_ed25519(value: &str) -> Result<VerifyingKey, DidError> {
    let encoded = value.strip_prefix('z').ok_or_else(|| {
        DidError::InvalidDocument("multibase key must use base58btc encoding (z prefix)".into())
    })?;

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| DidError::InvalidDocument(format!("invalid base58 key: {}", e)))?;

    match bytes.split_first_chunk::<2>() {
        Some((prefix, key)) if *prefix == ED25519_MULTICODEC => verifying_key_from_bytes(key),
        _ => Err(DidError::InvalidDocument(
            "multibase key is not an Ed25519 public key".into(),
        )),
    }
}

/// Decode a raw base58 Ed25519 key
pub fn decode_base58_ed25519(value: &str) -> Result<VerifyingKey, DidError> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| DidError::InvalidDocument(format!("invalid base58 key: {}", e)))?;
    verifying_key_from_bytes(&bytes)
}

fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, DidError> {
    let raw: [u8; 32] = bytes
        .try_into()
        .map_err(|_| DidError::InvalidDocument(format!("expected 32 key bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&raw)
        .map_err(|e| DidError::InvalidDocument(format!("invalid Ed25519 key: {}", e)))
}

/// Build the `did:key` identifier for a verifying key
pub fn did_key_from_verifying_key(key: &VerifyingKey) -> String {
    format!("did:key:{}", encode_multibase_ed25519(key))
}

/// Extract the verifying key embedded in a `did:key` identifier
pub fn verifying_key_from_did_key(did: &str) -> Result<VerifyingKey, DidError> {
    let key_part = did
        .strip_prefix("did:key:")
        .ok_or_else(|| DidError::InvalidDid("Missing did:key: prefix".to_string()))?;
    // Fragments (did:key:z...#z...) are not part of the key
    let key_part = key_part.split('#').next().unwrap_or(key_part);
    decode_multibase_ed25519(key_part).map_err(|e| DidError::InvalidDid(e.to_string()))
}
