mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Build a file-backed pool.
///
/// Every connection enables foreign keys (device and session rows cascade
/// when their account is deleted) and gets a bounded busy timeout so no
/// storage call blocks indefinitely; WAL keeps readers off the writer's lock.
pub fn create_pool(database_path: &str, busy_timeout_ms: u64) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(move |conn| {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
    });
    Pool::builder().max_size(10).build(manager)
}
