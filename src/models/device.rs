use serde::{Deserialize, Serialize};

/// A hardware fingerprint registered against an account.
///
/// The fingerprint is an opaque client-supplied string; the same value may
/// appear under different accounts, but (account, fingerprint) is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub account_id: String,
    pub fingerprint: String,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}
