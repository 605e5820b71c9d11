//! Transport-facing operations.
//!
//! [`LicenseService`] wires the registry and the session authority over one
//! connection pool and exposes exactly what a transport layer invokes:
//! `activate`, `login`, `verify_session`, `logout`, and the read-only
//! `check_license`. Wire formats and status-code mapping stay on the
//! transport side, keyed off [`crate::error::AppError::kind`].

use serde::Serialize;

use crate::config::Config;
use crate::credential::CredentialStore;
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::models::Account;
use crate::registry::{ActivateRequest, LicenseStatus, LoginRequest, Registry};
use crate::session::SessionAuthority;

/// A successful activation or login: the account plus a fresh bearer token.
#[derive(Debug, Serialize)]
pub struct AuthGrant {
    pub account: Account,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct LicenseService {
    registry: Registry,
    sessions: SessionAuthority,
}

impl LicenseService {
    /// Open (and initialize) the database at `config.database_path` and
    /// build the service on top of it.
    pub fn open(config: &Config) -> Result<Self> {
        let pool = db::create_pool(&config.database_path, config.busy_timeout_ms)?;
        let conn = pool.get()?;
        db::init_db(&conn)?;
        drop(conn);
        Ok(Self::from_pool(pool, config))
    }

    /// Build the service over an existing pool (the pool's connections must
    /// already point at an initialized database).
    pub fn from_pool(pool: DbPool, config: &Config) -> Self {
        let credentials = CredentialStore::new(config.pbkdf2_iterations);
        Self {
            registry: Registry::new(
                pool.clone(),
                credentials,
                config.max_devices,
                config.min_password_len,
            ),
            sessions: SessionAuthority::new(pool, config.session_ttl_days),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    /// Activate a license and start the first session on the activating
    /// device.
    pub fn activate(&self, req: &ActivateRequest) -> Result<AuthGrant> {
        let account = self.registry.activate(req)?;
        self.grant(account, &req.fingerprint)
    }

    /// Authenticate and start a session on the presenting device.
    pub fn login(&self, req: &LoginRequest) -> Result<AuthGrant> {
        let account = self.registry.login(req)?;
        self.grant(account, &req.fingerprint)
    }

    /// Resolve a bearer token presented from a device back to its account.
    pub fn verify_session(&self, token: &str, fingerprint: &str) -> Result<Account> {
        self.sessions.verify(token, fingerprint)
    }

    /// End a session. Idempotent.
    pub fn logout(&self, token: &str) -> Result<()> {
        self.sessions.revoke(token)
    }

    /// Read-only license status for pre-activation UI flows.
    pub fn check_license(&self, license_code: &str) -> Result<LicenseStatus> {
        self.registry.check_license(license_code)
    }

    fn grant(&self, account: Account, fingerprint: &str) -> Result<AuthGrant> {
        let issued = self.sessions.issue(&account, fingerprint)?;
        Ok(AuthGrant {
            account,
            token: issued.token,
            expires_at: issued.session.expires_at,
        })
    }
}
