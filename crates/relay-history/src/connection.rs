//! Connection pool construction and SQLite pragma discipline.
//!
//! Every connection runs `journal_mode=WAL` with `synchronous=FULL`:
//! an acknowledged append has been fsynced to the WAL before the call
//! returns, which is what the durable-append contract requires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::errors::Result;

/// Pooled SQLite connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
/// One checked-out connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool tuning knobs.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pooled connections.
    pub max_size: u32,
    /// SQLite busy timeout per connection.
    pub busy_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

fn init_connection(
    conn: &mut rusqlite::Connection,
    busy_timeout: Duration,
) -> std::result::Result<(), rusqlite::Error> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = FULL;
         PRAGMA foreign_keys = ON;",
    )
}

/// Open a pool over a database file.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let busy_timeout = config.busy_timeout;
    let manager =
        SqliteConnectionManager::file(path).with_init(move |c| init_connection(c, busy_timeout));
    let pool = r2d2::Pool::builder()
        .max_size(config.max_size)
        .build(manager)?;
    Ok(pool)
}

/// Distinguishes shared in-memory databases across pools in one process.
static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Open a pool over a fresh in-memory database (tests).
///
/// Uses a uniquely named shared-cache URI so every pooled connection sees
/// the same database. The database lives as long as the pool does.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
    let uri = format!("file:relay_mem_{seq}?mode=memory&cache=shared");
    let busy_timeout = config.busy_timeout;
    let manager = SqliteConnectionManager::file(uri)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_init(move |c| init_connection(c, busy_timeout));
    let pool = r2d2::Pool::builder()
        .max_size(config.max_size)
        .build(manager)?;
    Ok(pool)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
