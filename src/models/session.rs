use serde::{Deserialize, Serialize};

/// A bearer-token session bound to one (account, fingerprint) pair.
///
/// Only the SHA-256 hash of the token is persisted; the token value itself is
/// returned to the client once at issuance and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub account_id: String,
    pub fingerprint: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}
