//! Command signature verification
//!
//! A member's signature token is the base64 DER encoding of an RSA public key
//! (SubjectPublicKeyInfo). Every mutating command carries the exact text the
//! member signed and a base64 PKCS#1 v1.5 signature over the SHA-256 digest
//! of its UTF-8 bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Digital signature is not a valid public key: {0}")]
    InvalidKey(String),

    #[error("Request signature is malformed: {0}")]
    Malformed(String),

    #[error("Request signature does not match the signed text")]
    Mismatch,
}

fn decode_key(digital_signature: &str) -> Result<VerifyingKey<Sha256>, SignatureError> {
    let der = STANDARD
        .decode(digital_signature.trim())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    let key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    Ok(VerifyingKey::new(key))
}

/// Check that `request_signature` was produced over `signed_text` by the key
/// behind `digital_signature`
pub fn verify_signed_text(
    digital_signature: &str,
    signed_text: &str,
    request_signature: &str,
) -> Result<(), SignatureError> {
    let key = decode_key(digital_signature)?;
    let raw = STANDARD
        .decode(request_signature.trim())
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;
    let signature =
        Signature::try_from(raw.as_slice()).map_err(|e| SignatureError::Malformed(e.to_string()))?;
    key.verify(signed_text.as_bytes(), &signature)
        .map_err(|_| SignatureError::Mismatch)
}
