//! License/account registry: activation, login, and device admission.
//!
//! Owns the mapping from license code to account and from account to
//! registered devices, and the one-way activation transition. Password
//! operations are delegated to [`CredentialStore`]; session minting is the
//! session authority's job and happens after these operations succeed.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::credential::CredentialStore;
use crate::db::queries::{ActivationOutcome, DeviceAdmission};
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::{Account, Device};

/// Validated input for `activate`.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_code: String,
    pub username: String,
    pub password: String,
    pub fingerprint: String,
}

impl ActivateRequest {
    fn validate(&self) -> Result<()> {
        require_field(&self.license_code, "license_code")?;
        require_field(&self.username, "username")?;
        require_field(&self.password, "password")?;
        require_field(&self.fingerprint, "fingerprint")
    }
}

/// Validated input for `login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub fingerprint: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<()> {
        require_field(&self.username, "username")?;
        require_field(&self.password, "password")?;
        require_field(&self.fingerprint, "fingerprint")
    }
}

fn require_field(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", name)));
    }
    Ok(())
}

/// Read-only answer for `check_license`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LicenseStatus {
    /// The code names a provisioned license.
    pub valid: bool,
    /// The license has not been activated yet.
    pub available: bool,
}

#[derive(Clone)]
pub struct Registry {
    pool: DbPool,
    credentials: CredentialStore,
    max_devices: i64,
    min_password_len: usize,
}

impl Registry {
    pub fn new(
        pool: DbPool,
        credentials: CredentialStore,
        max_devices: i64,
        min_password_len: usize,
    ) -> Self {
        Self {
            pool,
            credentials,
            max_devices,
            min_password_len,
        }
    }

    /// Insert an `Unactivated` account for a pre-generated license code,
    /// optionally pre-assigning its username.
    pub fn provision(&self, license_code: &str, username: Option<&str>) -> Result<Account> {
        require_field(license_code, "license_code")?;
        if let Some(name) = username {
            require_field(name, "username")?;
        }
        let conn = self.pool.get()?;
        let account = queries::provision_account(&conn, license_code, username)?;
        tracing::info!(account_id = %account.id, "license provisioned");
        Ok(account)
    }

    /// Bind a license code to a password-protected account and its first
    /// device.
    ///
    /// Retrying a completed activation with the same username, fingerprint,
    /// and password succeeds without mutating anything; any divergence on an
    /// already-activated code fails with `AlreadyActivated`.
    pub fn activate(&self, req: &ActivateRequest) -> Result<Account> {
        req.validate()?;
        if req.password.len() < self.min_password_len {
            return Err(AppError::WeakPassword {
                min: self.min_password_len,
            });
        }

        let mut conn = self.pool.get()?;

        let account =
            queries::get_account_by_code(&conn, &req.license_code)?.ok_or(AppError::InvalidCode)?;

        if account.is_activated() {
            return self.reactivation_check(&conn, account, req);
        }

        // Derive the credential before taking the write lock; PBKDF2 is the
        // expensive part of this operation.
        let password_hash = self.credentials.hash(&req.password);

        match queries::activate_account_atomic(
            &mut conn,
            &req.license_code,
            &req.username,
            &password_hash,
            &req.fingerprint,
        )? {
            ActivationOutcome::Activated { account, device } => {
                tracing::info!(
                    account_id = %account.id,
                    device_id = %device.id,
                    "license activated"
                );
                Ok(account)
            }
            ActivationOutcome::Raced(account) => self.reactivation_check(&conn, account, req),
        }
    }

    /// Idempotent-retry rules for an already-activated account: same
    /// username, same fingerprint, and a password that verifies. Anything
    /// else is a divergent re-activation and is rejected uniformly, without
    /// revealing which part diverged.
    fn reactivation_check(
        &self,
        conn: &Connection,
        account: Account,
        req: &ActivateRequest,
    ) -> Result<Account> {
        let same_username = account.username.as_deref() == Some(req.username.as_str());
        let known_device =
            queries::get_device_for_account(conn, &account.id, &req.fingerprint)?.is_some();
        let password_ok = match account.password_hash.as_deref() {
            Some(credential) => self.credentials.verify(&req.password, credential)?,
            None => false,
        };

        if same_username && known_device && password_ok {
            return Ok(account);
        }

        tracing::warn!(account_id = %account.id, "divergent re-activation rejected");
        Err(AppError::AlreadyActivated)
    }

    /// Authenticate a username/password pair and admit the presenting
    /// device.
    ///
    /// Unknown usernames and wrong passwords fail identically; a new
    /// fingerprint is admitted only while the account is under its device
    /// quota.
    pub fn login(&self, req: &LoginRequest) -> Result<Account> {
        req.validate()?;

        let mut conn = self.pool.get()?;

        let Some(account) = queries::get_account_by_username(&conn, &req.username)? else {
            // Burn the same derivation cost as a real check so unknown
            // usernames are not distinguishable by timing.
            self.credentials.verify_dummy(&req.password);
            return Err(AppError::InvalidCredentials);
        };

        if !account.is_activated() {
            return Err(AppError::NotActivated);
        }

        let credential = account
            .password_hash
            .as_deref()
            .ok_or(AppError::NotActivated)?;
        if !self.credentials.verify(&req.password, credential)? {
            tracing::warn!(account_id = %account.id, "login rejected: bad credentials");
            return Err(AppError::InvalidCredentials);
        }

        let admission = queries::add_device_if_under_quota(
            &mut conn,
            &account.id,
            &req.fingerprint,
            self.max_devices,
        )?;
        if let DeviceAdmission::Registered(device) = &admission {
            tracing::info!(
                account_id = %account.id,
                device_id = %device.id,
                "new device registered"
            );
        }

        let last_login_at = queries::touch_last_login(&conn, &account.id)?;
        Ok(Account {
            last_login_at: Some(last_login_at),
            ..account
        })
    }

    /// Read-only license lookup. No side effects, no authentication.
    pub fn check_license(&self, license_code: &str) -> Result<LicenseStatus> {
        let conn = self.pool.get()?;
        Ok(match queries::get_account_by_code(&conn, license_code)? {
            Some(account) => LicenseStatus {
                valid: true,
                available: !account.is_activated(),
            },
            None => LicenseStatus {
                valid: false,
                available: false,
            },
        })
    }

    /// List an account's registered devices, oldest first.
    pub fn devices(&self, account_id: &str) -> Result<Vec<Device>> {
        let conn = self.pool.get()?;
        queries::list_devices_for_account(&conn, account_id)
    }

    /// Manually free a quota slot. Sessions bound to the removed device die
    /// with it. Returns false when the fingerprint was not registered.
    pub fn deactivate_device(&self, account_id: &str, fingerprint: &str) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let removed = queries::remove_device(&mut conn, account_id, fingerprint)?;
        if removed {
            tracing::info!(account_id = %account_id, "device deactivated");
        }
        Ok(removed)
    }

    /// Delete an account outright. Devices and sessions cascade.
    pub fn delete_account(&self, account_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::delete_account(&conn, account_id)
    }
}
