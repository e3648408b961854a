//! A fixed set of bootstrapped connections to one database.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use super::error::StoreError;
use super::schema;
use super::statements::StatementRegistry;

/// Path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Sizing and contention limits for a [`Store`](super::Store).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Connections opened against a file-backed database. An in-memory
    /// database always gets exactly one.
    pub pool_size: usize,
    /// How long a call waits for a free connection, and how long SQLite
    /// waits on another connection's write lock, before failing as busy.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Connections handed out one caller at a time.
///
/// Every connection has the SQL functions installed and every statement
/// prepared in its own cache. File-backed databases run in WAL mode, so a
/// read on one connection is not blocked by a transaction open on another.
pub(crate) struct Pool {
    conns: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
    busy_timeout: Duration,
}

impl Pool {
    /// Opens the connections, migrating the schema through the first.
    pub(crate) fn open(
        path: &Path,
        options: &StoreOptions,
    ) -> Result<(Self, StatementRegistry), StoreError> {
        let in_memory = path == Path::new(IN_MEMORY);
        let size = if in_memory { 1 } else { options.pool_size.max(1) };

        let first = connect(path, in_memory, options)?;
        schema::migrate(&first)?;
        let registry = StatementRegistry::prepare(&first)?;

        let mut conns = vec![Mutex::new(first)];
        for _ in 1..size {
            let conn = connect(path, in_memory, options)?;
            StatementRegistry::prepare(&conn)?;
            conns.push(Mutex::new(conn));
        }
        tracing::debug!(connections = conns.len(), "connection pool ready");

        let pool = Self {
            conns,
            cursor: AtomicUsize::new(0),
            busy_timeout: options.busy_timeout,
        };
        Ok((pool, registry))
    }

    pub(crate) fn len(&self) -> usize {
        self.conns.len()
    }

    /// Takes a free connection, waiting up to the busy timeout for one.
    ///
    /// Returns `None` when none frees up in time, including when the only
    /// connection is held further up the calling thread's own stack.
    pub(crate) fn acquire(&self) -> Option<MutexGuard<'_, Connection>> {
        let len = self.conns.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;

        (0..len)
            .find_map(|offset| self.conns[(start + offset) % len].try_lock())
            .or_else(|| self.conns[start].try_lock_for(self.busy_timeout))
    }
}

fn connect(path: &Path, in_memory: bool, options: &StoreOptions) -> Result<Connection, StoreError> {
    let conn = if in_memory {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    }
    .map_err(StoreError::Open)?;

    if !in_memory {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(StoreError::Open)?;
    }
    conn.busy_timeout(options.busy_timeout)
        .map_err(StoreError::Open)?;
    schema::register_functions(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pool_size: usize) -> StoreOptions {
        StoreOptions {
            pool_size,
            busy_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_in_memory_uses_one_connection() {
        let (pool, _) = Pool::open(Path::new(IN_MEMORY), &options(4)).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_file_backed_pool_runs_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, _) = Pool::open(&dir.path().join("pool.db"), &options(3)).unwrap();
        assert_eq!(pool.len(), 3);

        let mode: String = pool
            .acquire()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_acquire_skips_held_connections() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, _) = Pool::open(&dir.path().join("pool.db"), &options(2)).unwrap();

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert!(!std::ptr::eq(&*first, &*second));
    }

    #[test]
    fn test_acquire_gives_up_when_exhausted() {
        let (pool, _) = Pool::open(Path::new(IN_MEMORY), &options(4)).unwrap();

        let _held = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
    }
}
