use std::env;

use crate::credential::MIN_ITERATIONS;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Maximum distinct hardware fingerprints per account.
    pub max_devices: i64,
    /// Bearer-token validity window.
    pub session_ttl_days: i64,
    pub min_password_len: usize,
    /// PBKDF2 round count; floored at `credential::MIN_ITERATIONS`.
    pub pbkdf2_iterations: u32,
    /// SQLite busy handler timeout per connection.
    pub busy_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let max_devices: i64 = env::var("MAX_DEVICES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let session_ttl_days: i64 = env::var("SESSION_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let pbkdf2_iterations: u32 = env::var("PBKDF2_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100_000)
            .max(MIN_ITERATIONS);

        Self {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "keyward.db".to_string()),
            max_devices,
            session_ttl_days,
            min_password_len: env::var("MIN_PASSWORD_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
            pbkdf2_iterations,
            busy_timeout_ms: env::var("DB_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000),
        }
    }
}
