use serde::{Deserialize, Serialize};

/// Activation is a one-way transition: once `Activated`, an account never
/// reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Unactivated,
    Activated,
}

impl ActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationState::Unactivated => "unactivated",
            ActivationState::Activated => "activated",
        }
    }
}

impl std::str::FromStr for ActivationState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unactivated" => Ok(ActivationState::Unactivated),
            "activated" => Ok(ActivationState::Activated),
            _ => Err(()),
        }
    }
}

/// One account per license code. `username` and `password_hash` stay NULL
/// until activation completes (unless the username was pre-provisioned by an
/// operator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub license_code: String,
    pub username: Option<String>,
    /// Serialized PBKDF2 credential. Never leaves the core: skipped on
    /// serialization so a transport layer cannot leak it by accident.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub state: ActivationState,
    pub created_at: i64,
    /// Informational only; does not gate any behavior.
    pub last_login_at: Option<i64>,
}

impl Account {
    pub fn is_activated(&self) -> bool {
        self.state == ActivationState::Activated
    }
}
