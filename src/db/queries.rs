use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{ACCOUNT_COLS, DEVICE_COLS, SESSION_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// True when `e` is a UNIQUE violation on the given column (SQLite names the
/// column in the failure message).
fn is_unique_violation(e: &rusqlite::Error, column: &str) -> bool {
    if let rusqlite::Error::SqliteFailure(failure, Some(msg)) = e {
        failure.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column)
    } else {
        false
    }
}

// ============ Accounts ============

/// Insert an `Unactivated` account row for a pre-generated license code.
///
/// An operator may pre-assign the username along with the code; otherwise the
/// username is claimed at activation time.
pub fn provision_account(
    conn: &Connection,
    license_code: &str,
    username: Option<&str>,
) -> Result<Account> {
    let id = EntityType::Account.gen_id();
    let created_at = now();

    let inserted = conn.execute(
        "INSERT INTO accounts (id, license_code, username, state, created_at)
         VALUES (?1, ?2, ?3, 'unactivated', ?4)",
        params![&id, license_code, username, created_at],
    );

    match inserted {
        Ok(_) => Ok(Account {
            id,
            license_code: license_code.to_string(),
            username: username.map(String::from),
            password_hash: None,
            state: ActivationState::Unactivated,
            created_at,
            last_login_at: None,
        }),
        Err(ref e) if is_unique_violation(e, "accounts.license_code") => Err(
            AppError::InvalidInput("License code is already provisioned".into()),
        ),
        Err(ref e) if is_unique_violation(e, "accounts.username") => Err(AppError::UsernameTaken),
        Err(e) => Err(e.into()),
    }
}

pub fn get_account_by_code(conn: &Connection, license_code: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE license_code = ?1", ACCOUNT_COLS),
        &[&license_code],
    )
}

pub fn get_account_by_username(conn: &Connection, username: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE username = ?1", ACCOUNT_COLS),
        &[&username],
    )
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

/// Record a successful login. Returns the timestamp written.
pub fn touch_last_login(conn: &Connection, id: &str) -> Result<i64> {
    let now = now();
    conn.execute(
        "UPDATE accounts SET last_login_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(now)
}

/// Delete an account. Devices and sessions cascade.
pub fn delete_account(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

/// Outcome of an activation attempt that reached the database.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// Credential stored, state transitioned, first device registered.
    Activated { account: Account, device: Device },
    /// The account flipped to `Activated` between the caller's read and this
    /// transaction. The caller re-evaluates the idempotent-retry rules
    /// against the returned row; no writes happened.
    Raced(Account),
}

/// Atomically complete an activation: claim the username, store the
/// credential, transition the state, and register the first device.
///
/// Uses an IMMEDIATE transaction so the write lock is held from the first
/// read, preventing two concurrent activations from both observing
/// `unactivated`. Partial application is never observable: either every
/// write commits or none do.
pub fn activate_account_atomic(
    conn: &mut Connection,
    license_code: &str,
    username: &str,
    password_hash: &str,
    fingerprint: &str,
) -> Result<ActivationOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let account: Account = query_one(
        &tx,
        &format!("SELECT {} FROM accounts WHERE license_code = ?1", ACCOUNT_COLS),
        &[&license_code],
    )?
    .ok_or(AppError::InvalidCode)?;

    if account.is_activated() {
        return Ok(ActivationOutcome::Raced(account));
    }

    // A pre-provisioned username is part of the entitlement; the request
    // must present the same one.
    if let Some(provisioned) = account.username.as_deref()
        && provisioned != username
    {
        return Err(AppError::InvalidInput(
            "Username does not match the provisioned account".into(),
        ));
    }

    let taken: Option<String> = tx
        .query_row(
            "SELECT id FROM accounts WHERE username = ?1 AND id != ?2",
            params![username, account.id],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(AppError::UsernameTaken);
    }

    let now = now();
    tx.execute(
        "UPDATE accounts SET username = ?1, password_hash = ?2, state = 'activated'
         WHERE id = ?3 AND state = 'unactivated'",
        params![username, password_hash, account.id],
    )?;

    let device = Device {
        id: EntityType::Device.gen_id(),
        account_id: account.id.clone(),
        fingerprint: fingerprint.to_string(),
        first_seen_at: now,
        last_seen_at: now,
    };
    tx.execute(
        "INSERT INTO devices (id, account_id, fingerprint, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&device.id, &device.account_id, &device.fingerprint, now, now],
    )?;

    tx.commit()?;

    Ok(ActivationOutcome::Activated {
        account: Account {
            username: Some(username.to_string()),
            password_hash: Some(password_hash.to_string()),
            state: ActivationState::Activated,
            ..account
        },
        device,
    })
}

// ============ Devices ============

/// Result of admitting a fingerprint against an account's quota.
#[derive(Debug)]
pub enum DeviceAdmission {
    /// The fingerprint was already registered; `last_seen_at` was updated.
    Existing(Device),
    /// A new device row was created within the quota.
    Registered(Device),
}

/// Atomically admit a fingerprint, enforcing the device quota.
///
/// Uses an IMMEDIATE transaction so the count-then-insert cannot race:
/// two concurrent logins can never both observe a free slot and exceed the
/// quota. A fingerprint already on record bypasses the quota check entirely.
pub fn add_device_if_under_quota(
    conn: &mut Connection,
    account_id: &str,
    fingerprint: &str,
    quota: i64,
) -> Result<DeviceAdmission> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<Device> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM devices WHERE account_id = ?1 AND fingerprint = ?2",
            DEVICE_COLS
        ),
        &[&account_id, &fingerprint],
    )?;

    if let Some(device) = existing {
        let now = now();
        tx.execute(
            "UPDATE devices SET last_seen_at = ?1 WHERE id = ?2",
            params![now, device.id],
        )?;
        tx.commit()?;
        return Ok(DeviceAdmission::Existing(Device {
            last_seen_at: now,
            ..device
        }));
    }

    let registered: i64 = tx.query_row(
        "SELECT COUNT(*) FROM devices WHERE account_id = ?1",
        params![account_id],
        |row| row.get(0),
    )?;

    if registered >= quota {
        return Err(AppError::DeviceLimitExceeded {
            registered,
            limit: quota,
        });
    }

    let now = now();
    let device = Device {
        id: EntityType::Device.gen_id(),
        account_id: account_id.to_string(),
        fingerprint: fingerprint.to_string(),
        first_seen_at: now,
        last_seen_at: now,
    };
    tx.execute(
        "INSERT INTO devices (id, account_id, fingerprint, first_seen_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&device.id, &device.account_id, &device.fingerprint, now, now],
    )?;

    tx.commit()?;

    Ok(DeviceAdmission::Registered(device))
}

pub fn get_device_for_account(
    conn: &Connection,
    account_id: &str,
    fingerprint: &str,
) -> Result<Option<Device>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM devices WHERE account_id = ?1 AND fingerprint = ?2",
            DEVICE_COLS
        ),
        &[&account_id, &fingerprint],
    )
}

pub fn list_devices_for_account(conn: &Connection, account_id: &str) -> Result<Vec<Device>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM devices WHERE account_id = ?1 ORDER BY first_seen_at",
            DEVICE_COLS
        ),
        &[&account_id],
    )
}

pub fn count_devices_for_account(conn: &Connection, account_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM devices WHERE account_id = ?1",
        params![account_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Remove a device binding and every session bound to it, in one
/// transaction. Returns false when the fingerprint was not registered.
pub fn remove_device(conn: &mut Connection, account_id: &str, fingerprint: &str) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let deleted = tx.execute(
        "DELETE FROM devices WHERE account_id = ?1 AND fingerprint = ?2",
        params![account_id, fingerprint],
    )?;
    if deleted == 0 {
        return Ok(false);
    }

    tx.execute(
        "DELETE FROM sessions WHERE account_id = ?1 AND fingerprint = ?2",
        params![account_id, fingerprint],
    )?;

    tx.commit()?;
    Ok(true)
}

// ============ Sessions ============

pub fn insert_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, token_hash, account_id, fingerprint, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &session.id,
            &session.token_hash,
            &session.account_id,
            &session.fingerprint,
            session.issued_at,
            session.expires_at
        ],
    )?;
    Ok(())
}

pub fn get_session_by_token_hash(conn: &Connection, token_hash: &str) -> Result<Option<Session>> {
    query_one(
        conn,
        &format!("SELECT {} FROM sessions WHERE token_hash = ?1", SESSION_COLS),
        &[&token_hash],
    )
}

/// Idempotent: deleting a missing session is a no-op, not an error.
pub fn delete_session_by_token_hash(conn: &Connection, token_hash: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

/// Bulk-delete expired sessions. Verification checks expiry lazily, so this
/// exists only to keep the table small.
pub fn delete_expired_sessions(conn: &Connection) -> Result<usize> {
    let now = now();
    let deleted = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
    Ok(deleted)
}
