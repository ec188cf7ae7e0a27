//! Ed25519 signing and verification over canonical byte strings.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Ed25519 signatures and public keys are fixed-size; the wire/account-store
/// representation is lowercase hex of the raw bytes.
pub const PUBLIC_KEY_HEX_LEN: usize = 64;
pub const SIGNATURE_HEX_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
}

/// Sign `message` (already the canonical byte form) with `signing_key`,
/// returning the hex-encoded signature.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> String {
    let sig: Signature = signing_key.sign(message);
    hex::encode(sig.to_bytes())
}

/// Verify a hex-encoded signature against a hex-encoded public key and the
/// canonical message bytes. Returns `false` (never an error) for any
/// malformed input — callers treat malformed signatures as simply invalid.
pub fn verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let Ok(verifying_key) = decode_public_key(public_key_hex) else {
        return false;
    };
    let Ok(signature) = decode_signature(signature_hex) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

pub fn decode_public_key(hex_str: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = hex::decode(hex_str).map_err(|_| SignatureError::InvalidPublicKey)?;
    let array: [u8; 32] = bytes.try_into().map_err(|_| SignatureError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&array).map_err(|_| SignatureError::InvalidPublicKey)
}

pub fn decode_signature(hex_str: &str) -> Result<Signature, SignatureError> {
    let bytes = hex::decode(hex_str).map_err(|_| SignatureError::InvalidSignature)?;
    let array: [u8; 64] = bytes.try_into().map_err(|_| SignatureError::InvalidSignature)?;
    Ok(Signature::from_bytes(&array))
}
