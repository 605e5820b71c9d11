//! Test utilities and fixtures for Keyward integration tests

#![allow(dead_code)]

use rusqlite::Connection;

// Re-export the main library crate
pub use keyward::config::Config;
pub use keyward::credential::CredentialStore;
pub use keyward::db::{DbPool, create_pool, init_db, queries};
pub use keyward::error::AppError;
pub use keyward::models::*;
pub use keyward::registry::{ActivateRequest, LoginRequest, Registry};
pub use keyward::service::LicenseService;
pub use keyward::session::SessionAuthority;

/// Keep test credentials at the derivation floor so suites stay fast.
pub const TEST_ITERATIONS: u32 = 10_000;

pub const TEST_MAX_DEVICES: i64 = 3;
pub const TEST_MIN_PASSWORD_LEN: usize = 6;
pub const TEST_SESSION_TTL_DAYS: i64 = 30;

/// Create an in-memory test database with schema initialized.
///
/// For query-level tests that drive a single connection directly.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.pragma_update(None, "foreign_keys", "ON")
        .expect("Failed to enable foreign keys");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// A file-backed pool in the OS temp dir, cleaned up on drop.
///
/// Registry/session tests need a real pool; an in-memory pool would hand
/// every checked-out connection its own private database.
pub struct TestDb {
    pub pool: DbPool,
    path: std::path::PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!(
            "keyward-test-{}.db",
            uuid::Uuid::new_v4().as_simple()
        ));
        let pool = create_pool(path.to_str().expect("temp path is not UTF-8"), 5_000)
            .expect("Failed to create pool");
        {
            let conn = pool.get().expect("Failed to get connection");
            init_db(&conn).expect("Failed to initialize schema");
        }
        TestDb { pool, path }
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(format!("{}-wal", self.path.display()));
        let _ = std::fs::remove_file(format!("{}-shm", self.path.display()));
    }
}

/// Config matching the test fixtures; `database_path` is unused because the
/// tests hand `from_pool` an already-open pool.
pub fn test_config() -> Config {
    Config {
        database_path: ":memory:".to_string(),
        max_devices: TEST_MAX_DEVICES,
        session_ttl_days: TEST_SESSION_TTL_DAYS,
        min_password_len: TEST_MIN_PASSWORD_LEN,
        pbkdf2_iterations: TEST_ITERATIONS,
        busy_timeout_ms: 5_000,
    }
}

pub fn test_registry(db: &TestDb) -> Registry {
    Registry::new(
        db.pool.clone(),
        CredentialStore::new(TEST_ITERATIONS),
        TEST_MAX_DEVICES,
        TEST_MIN_PASSWORD_LEN,
    )
}

pub fn test_authority(db: &TestDb) -> SessionAuthority {
    SessionAuthority::new(db.pool.clone(), TEST_SESSION_TTL_DAYS)
}

pub fn test_service(db: &TestDb) -> LicenseService {
    LicenseService::from_pool(db.pool.clone(), &test_config())
}

pub fn activate_request(code: &str, username: &str, password: &str, fp: &str) -> ActivateRequest {
    ActivateRequest {
        license_code: code.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        fingerprint: fp.to_string(),
    }
}

pub fn login_request(username: &str, password: &str, fp: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
        fingerprint: fp.to_string(),
    }
}

/// Provision a code and activate it in one go, returning the account.
pub fn activate_test_account(
    registry: &Registry,
    code: &str,
    username: &str,
    password: &str,
    fp: &str,
) -> Account {
    registry
        .provision(code, None)
        .expect("Failed to provision test license");
    registry
        .activate(&activate_request(code, username, password, fp))
        .expect("Failed to activate test license")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a future timestamp (days from now)
pub fn future_timestamp(days: i64) -> i64 {
    now() + (days * 86400)
}

/// Get a past timestamp (days ago)
pub fn past_timestamp(days: i64) -> i64 {
    now() - (days * 86400)
}
