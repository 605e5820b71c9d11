//! Password credential derivation and verification.
//!
//! Credentials are PBKDF2-HMAC-SHA256 with a per-call random 16-byte salt,
//! serialized as `pbkdf2-sha256$<rounds>$<salt b64>$<digest b64>` so the salt
//! and round count travel with the stored credential. Verification re-derives
//! with the embedded parameters and compares in constant time.
//!
//! Pure over its inputs: no I/O, no state beyond the configured round count.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// Serialization scheme tag; bump if the format ever changes.
const SCHEME: &str = "pbkdf2-sha256";

/// Salt size in bytes (128 bits).
const SALT_SIZE: usize = 16;

/// Derived digest size in bytes (256 bits).
const DIGEST_SIZE: usize = 32;

/// Lower bound on the round count; configs below this are raised to it.
pub const MIN_ITERATIONS: u32 = 10_000;

/// Derives and verifies password credentials.
///
/// Thread-safe and cheaply cloneable.
#[derive(Clone)]
pub struct CredentialStore {
    iterations: u32,
    dummy: String,
}

impl CredentialStore {
    pub fn new(iterations: u32) -> Self {
        let iterations = iterations.max(MIN_ITERATIONS);
        // A fixed throwaway credential. Verified against when no real
        // credential exists, so the unknown-account path costs the same as a
        // failed password check. The zero salt is fine: this value never
        // guards anything.
        let dummy = encode_credential(
            iterations,
            &[0u8; SALT_SIZE],
            &derive(b"keyward-dummy", &[0u8; SALT_SIZE], iterations),
        );
        Self { iterations, dummy }
    }

    /// Derive a credential for storage. Each call salts independently, so
    /// hashing the same password twice yields different credentials.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let digest = derive(password.as_bytes(), &salt, self.iterations);
        encode_credential(self.iterations, &salt, &digest)
    }

    /// Re-derive with the credential's embedded salt and round count and
    /// compare in constant time.
    pub fn verify(&self, password: &str, credential: &str) -> Result<bool> {
        let (iterations, salt, expected) = decode_credential(credential)?;
        let digest = derive(password.as_bytes(), &salt, iterations);
        Ok(digest.as_slice().ct_eq(expected.as_slice()).into())
    }

    /// Burn one full derivation against the fixed dummy credential.
    ///
    /// Callers use this on the unknown-account path so its timing matches a
    /// real failed verification.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy);
    }
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; DIGEST_SIZE] {
    let mut out = [0u8; DIGEST_SIZE];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

fn encode_credential(iterations: u32, salt: &[u8], digest: &[u8]) -> String {
    format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        BASE64.encode(salt),
        BASE64.encode(digest)
    )
}

fn decode_credential(credential: &str) -> Result<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = credential.split('$');
    let (scheme, rounds, salt, digest) = match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(rounds), Some(salt), Some(digest), None) => {
            (scheme, rounds, salt, digest)
        }
        _ => return Err(AppError::Internal("Malformed credential".into())),
    };

    if scheme != SCHEME {
        return Err(AppError::Internal(format!(
            "Unknown credential scheme: {}",
            scheme
        )));
    }

    let iterations: u32 = rounds
        .parse()
        .map_err(|_| AppError::Internal("Malformed credential round count".into()))?;

    let salt = BASE64
        .decode(salt)
        .map_err(|_| AppError::Internal("Malformed credential salt".into()))?;
    let digest = BASE64
        .decode(digest)
        .map_err(|_| AppError::Internal("Malformed credential digest".into()))?;

    if salt.len() != SALT_SIZE || digest.len() != DIGEST_SIZE {
        return Err(AppError::Internal("Malformed credential length".into()));
    }

    Ok((iterations, salt, digest))
}
