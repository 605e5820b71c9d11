//! Session authority: minting, verifying, and revoking bearer tokens.
//!
//! A token is 32 bytes of OS entropy, base64url-encoded, handed to the
//! client exactly once. Storage only ever sees its SHA-256 hash, so a copy
//! of the database does not yield usable tokens. Expiry is fixed at issuance
//! and checked lazily at verification time.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::{Account, Session};

/// Token size in bytes (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

const SECONDS_PER_DAY: i64 = 86_400;

/// Hash a bearer token for storage/lookup. Domain-separated so the digests
/// can never collide with other hashed material.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"keyward-v1:");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A freshly minted session plus the one-time plaintext token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

#[derive(Clone)]
pub struct SessionAuthority {
    pool: DbPool,
    ttl_seconds: i64,
}

impl SessionAuthority {
    pub fn new(pool: DbPool, ttl_days: i64) -> Self {
        Self {
            pool,
            ttl_seconds: ttl_days * SECONDS_PER_DAY,
        }
    }

    /// Mint a session for an (account, fingerprint) pair.
    ///
    /// Token values are never reused: the UNIQUE constraint on the stored
    /// hash turns a collision into a retry, though at 256 bits the retry
    /// path is theoretical.
    pub fn issue(&self, account: &Account, fingerprint: &str) -> Result<IssuedSession> {
        let conn = self.pool.get()?;

        for _ in 0..2 {
            let token = generate_token();
            let now = Utc::now().timestamp();
            let session = Session {
                id: EntityType::Session.gen_id(),
                token_hash: hash_token(&token),
                account_id: account.id.clone(),
                fingerprint: fingerprint.to_string(),
                issued_at: now,
                expires_at: now + self.ttl_seconds,
            };

            match queries::insert_session(&conn, &session) {
                Ok(()) => {
                    tracing::debug!(session_id = %session.id, "session issued");
                    return Ok(IssuedSession { token, session });
                }
                Err(AppError::Database(rusqlite::Error::SqliteFailure(failure, _)))
                    if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(
            "Failed to mint a unique session token".into(),
        ))
    }

    /// Resolve a token back to its owning account.
    ///
    /// Fails with `SessionNotFound` for unknown (or revoked) tokens,
    /// `SessionExpired` past the expiry instant, and `DeviceMismatch` when
    /// presented from a fingerprint other than the one it was issued for.
    pub fn verify(&self, token: &str, fingerprint: &str) -> Result<Account> {
        let conn = self.pool.get()?;

        let session = queries::get_session_by_token_hash(&conn, &hash_token(token))?
            .ok_or(AppError::SessionNotFound)?;

        if session.is_expired(Utc::now().timestamp()) {
            // Lazy expiry: drop the row now that we have seen it. Failure to
            // delete is harmless; the next verify hits the same check.
            let _ = queries::delete_session_by_token_hash(&conn, &session.token_hash);
            return Err(AppError::SessionExpired);
        }

        if session.fingerprint != fingerprint {
            tracing::warn!(
                session_id = %session.id,
                "session presented from a different device"
            );
            return Err(AppError::DeviceMismatch);
        }

        // The account can vanish underneath a live session (account
        // deletion); that session is gone too.
        queries::get_account_by_id(&conn, &session.account_id)?.ok_or(AppError::SessionNotFound)
    }

    /// Revoke a token. Unknown or already-revoked tokens are a no-op.
    pub fn revoke(&self, token: &str) -> Result<()> {
        let conn = self.pool.get()?;
        if queries::delete_session_by_token_hash(&conn, &hash_token(token))? {
            tracing::debug!("session revoked");
        }
        Ok(())
    }

    /// Eagerly delete expired sessions. Optional: verification re-checks
    /// expiry, so correctness never depends on sweeping.
    pub fn sweep_expired(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let swept = queries::delete_expired_sessions(&conn)?;
        if swept > 0 {
            tracing::debug!("swept {} expired sessions", swept);
        }
        Ok(swept)
    }
}
