use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Accounts (one row per license code)
        -- username/password_hash are NULL until activation completes, except
        -- when an operator pre-provisions the username with the code.
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            license_code TEXT NOT NULL UNIQUE,
            username TEXT UNIQUE,
            password_hash TEXT,
            state TEXT NOT NULL DEFAULT 'unactivated' CHECK (state IN ('unactivated', 'activated')),
            created_at INTEGER NOT NULL,
            last_login_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_username ON accounts(username);

        -- Devices (hardware fingerprints registered against an account)
        -- Fingerprints are opaque; identical values may exist under
        -- different accounts.
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            fingerprint TEXT NOT NULL,
            first_seen_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            UNIQUE(account_id, fingerprint)
        );
        CREATE INDEX IF NOT EXISTS idx_devices_account ON devices(account_id);

        -- Sessions (bearer tokens, stored as SHA-256 hashes)
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            token_hash TEXT NOT NULL UNIQUE,
            account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            fingerprint TEXT NOT NULL,
            issued_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        "#,
    )
}
