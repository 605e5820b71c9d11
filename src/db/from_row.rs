//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt rows.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ACCOUNT_COLS: &str =
    "id, license_code, username, password_hash, state, created_at, last_login_at";

pub const DEVICE_COLS: &str = "id, account_id, fingerprint, first_seen_at, last_seen_at";

pub const SESSION_COLS: &str = "id, token_hash, account_id, fingerprint, issued_at, expires_at";

// ============ FromRow Implementations ============

impl FromRow for Account {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            license_code: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            state: parse_enum(row, 4, "state")?,
            created_at: row.get(5)?,
            last_login_at: row.get(6)?,
        })
    }
}

impl FromRow for Device {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Device {
            id: row.get(0)?,
            account_id: row.get(1)?,
            fingerprint: row.get(2)?,
            first_seen_at: row.get(3)?,
            last_seen_at: row.get(4)?,
        })
    }
}

impl FromRow for Session {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Session {
            id: row.get(0)?,
            token_hash: row.get(1)?,
            account_id: row.get(2)?,
            fingerprint: row.get(3)?,
            issued_at: row.get(4)?,
            expires_at: row.get(5)?,
        })
    }
}
