//! Prefixed ID generation for Keyward entities.
//!
//! All IDs use a `kw_` brand prefix so account, device, and session IDs are
//! distinguishable at a glance in logs and storage.
//!
//! Format: `kw_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["kw_acct_", "kw_dev_", "kw_ses_"];

/// Validate that a string is a valid Keyward prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `kw_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];

    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Keyward.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Account,
    Device,
    Session,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Account => "kw_acct",
            Self::Device => "kw_dev",
            Self::Session => "kw_ses",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
