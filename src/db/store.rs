//! Owning handle over the database connections.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use super::error::StoreError;
use super::mustang::MustangService;
use super::pool::{IN_MEMORY, Pool, StoreOptions};

/// The stored form of a mustang, including soft-delete state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: Uuid,
    pub name: String,
    pub deleted_at: Option<String>,
}

/// The record store.
///
/// Cloning is cheap: clones share the connection pool and the prepared
/// statement registry.
#[derive(Clone)]
pub struct Store {
    pool: Arc<Pool>,
    mustangs: MustangService,
}

impl Store {
    /// Opens (or creates) the database at `path` with default options.
    ///
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Any failure here is a deployment problem; callers treat it as fatal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Opens (or creates) the database at `path`. Each pooled connection
    /// gets the SQL functions and every prepared statement; the schema is
    /// applied once.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let (pool, stmts) = Pool::open(path.as_ref(), &options)?;

        let pool = Arc::new(pool);
        let mustangs = MustangService::new(Arc::clone(&pool), Arc::new(stmts));
        Ok(Self { pool, mustangs })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_in_memory_with(StoreOptions::default())
    }

    /// Opens a private in-memory database. It has a single connection
    /// whatever `options.pool_size` says.
    pub fn open_in_memory_with(options: StoreOptions) -> Result<Self, StoreError> {
        Self::open_with(IN_MEMORY, options)
    }

    pub fn mustangs(&self) -> &MustangService {
        &self.mustangs
    }

    /// Number of pooled connections.
    pub fn connections(&self) -> usize {
        self.pool.len()
    }

    /// Runs `f` inside a new transaction.
    ///
    /// Commits when `f` returns `Ok` and rolls back when it returns `Err`.
    /// The transaction takes the write lock up front and keeps its pooled
    /// connection until then. Plain calls from inside `f` or from other
    /// threads run on other pooled connections and see only committed data.
    /// With no free connection they fail with [`StoreError::Busy`] after the
    /// busy timeout.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.pool.acquire().ok_or_else(|| StoreError::Busy {
            op: "error beginning transaction".to_string(),
        })?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::db("error beginning transaction", e))?;

        // On error `tx` is dropped here, which rolls it back.
        let value = f(&tx)?;

        tx.commit()
            .map_err(|e| StoreError::db("error committing transaction", e))?;
        Ok(value)
    }

    /// Reads the stored row for `id` regardless of its soft-delete state.
    pub fn raw_row(&self, id: Uuid) -> Result<Option<StoredRow>, StoreError> {
        let op = || format!("error reading raw mustang - {id}");
        let conn = self
            .pool
            .acquire()
            .ok_or_else(|| StoreError::Busy { op: op() })?;
        conn.query_row(
            "SELECT bin_to_uuid(mustang_id), name, deleted_at
             FROM mustangs
             WHERE mustang_id = uuid_to_bin(?1)",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| StoreError::db(op(), e))?
        .map(|(stored_id, name, deleted_at)| {
            Ok(StoredRow {
                id: super::mustang::parse_id(&stored_id)?,
                name,
                deleted_at,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Context, Mustang};
    use std::time::Duration;

    #[test]
    fn test_open_in_memory_is_empty() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.raw_row(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_transaction_commit() {
        let store = Store::open_in_memory().unwrap();
        let id = Uuid::new_v4();

        let name = store
            .transaction(|tx| {
                let ctx = Context::background().with_tx(tx);
                store.mustangs().create_tx(&ctx, &Mustang::new(id, "Foobar"))?;
                store.mustangs().update_tx(&ctx, &Mustang::new(id, "Baz"))?;
                Ok(store.mustangs().get_tx(&ctx, id)?.name)
            })
            .unwrap();

        assert_eq!(name, "Baz");
        assert_eq!(store.raw_row(id).unwrap().unwrap().name, "Baz");
    }

    #[test]
    fn test_transaction_rollback() {
        let store = Store::open_in_memory().unwrap();
        let id = Uuid::new_v4();

        let result: Result<(), StoreError> = store.transaction(|tx| {
            let ctx = Context::background().with_tx(tx);
            store.mustangs().create_tx(&ctx, &Mustang::new(id, "Foobar"))?;
            Err(StoreError::MissingTransaction)
        });

        assert!(result.is_err());
        assert!(store.raw_row(id).unwrap().is_none());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mustang.db");
        let id = Uuid::new_v4();

        {
            let store = Store::open(&path).unwrap();
            store
                .mustangs()
                .create(&Context::background(), &Mustang::new(id, "Foobar"))
                .unwrap();
        }

        let store = Store::open(&path).unwrap();
        let mustang = store.mustangs().get(&Context::background(), id).unwrap();
        assert_eq!(mustang.name, "Foobar");
    }

    #[test]
    fn test_in_memory_has_one_connection() {
        let store = Store::open_in_memory_with(StoreOptions {
            pool_size: 8,
            ..StoreOptions::default()
        })
        .unwrap();
        assert_eq!(store.connections(), 1);
    }

    #[test]
    fn test_plain_calls_inside_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("mustang.db")).unwrap();
        let ctx = Context::background();
        let committed = Uuid::new_v4();
        let pending = Uuid::new_v4();
        store
            .mustangs()
            .create(&ctx, &Mustang::new(committed, "Foobar"))
            .unwrap();

        store
            .transaction(|tx| {
                store
                    .mustangs()
                    .create_tx(&ctx.with_tx(tx), &Mustang::new(pending, "Baz"))?;

                // Other connections read the last committed state.
                assert_eq!(store.mustangs().get(&ctx, committed)?.name, "Foobar");
                assert!(matches!(
                    store.mustangs().get(&ctx, pending),
                    Err(StoreError::NotFound { .. })
                ));
                Ok(())
            })
            .unwrap();

        assert_eq!(store.mustangs().get(&ctx, pending).unwrap().name, "Baz");
    }

    #[test]
    fn test_plain_write_waits_out_transaction_then_fails_busy() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_with(
            dir.path().join("mustang.db"),
            StoreOptions {
                pool_size: 2,
                busy_timeout: Duration::from_millis(50),
            },
        )
        .unwrap();
        let ctx = Context::background();

        let result = store.transaction(|_tx| {
            store
                .mustangs()
                .create(&ctx, &Mustang::new(Uuid::new_v4(), "Foobar"))
        });

        let err = result.unwrap_err();
        assert!(err.is_busy(), "unexpected error: {err}");
    }
}
