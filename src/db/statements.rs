//! Registry of the parameterized statements the store executes.
//!
//! Every statement is known at compile time through [`Statement`]; there is
//! no string-keyed lookup that could miss at runtime. The registry prepares
//! each statement once against the live connection at startup, and a
//! statement that fails to prepare aborts startup.

use rusqlite::{CachedStatement, Connection};

use super::error::StoreError;

/// Capacity of the connection's prepared-statement cache.
///
/// Must hold every registered statement so none is evicted and re-prepared.
const STATEMENT_CACHE_CAPACITY: usize = 16;

const _: () = assert!(Statement::ALL.len() <= STATEMENT_CACHE_CAPACITY);

/// A named operation against the `mustangs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    CreateMustang,
    DeleteMustang,
    GetMustang,
    UpdateMustang,
}

impl Statement {
    pub const ALL: [Statement; 4] = [
        Statement::CreateMustang,
        Statement::DeleteMustang,
        Statement::GetMustang,
        Statement::UpdateMustang,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statement::CreateMustang => "create-mustang",
            Statement::DeleteMustang => "delete-mustang",
            Statement::GetMustang => "get-mustang",
            Statement::UpdateMustang => "update-mustang",
        }
    }

    /// Number of positional parameters the statement binds.
    pub fn arity(self) -> usize {
        match self {
            Statement::CreateMustang | Statement::UpdateMustang => 2,
            Statement::DeleteMustang | Statement::GetMustang => 1,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            // inserts a new row into the mustangs table
            Statement::CreateMustang => {
                "
                INSERT INTO mustangs (mustang_id, name)
                VALUES (uuid_to_bin(?1), ?2)
                "
            }
            // soft deletes a mustang by id
            Statement::DeleteMustang => {
                "
                UPDATE mustangs
                SET deleted_at = CURRENT_TIMESTAMP
                WHERE mustang_id = uuid_to_bin(?1)
                  AND deleted_at IS NULL
                "
            }
            // gets a single visible mustang by id
            Statement::GetMustang => {
                "
                SELECT bin_to_uuid(mustang_id), name
                FROM mustangs
                WHERE mustang_id = uuid_to_bin(?1)
                  AND deleted_at IS NULL
                "
            }
            // renames a single visible mustang by id
            Statement::UpdateMustang => {
                "
                UPDATE mustangs
                SET name = ?1
                WHERE mustang_id = uuid_to_bin(?2)
                  AND deleted_at IS NULL
                "
            }
        }
    }
}

/// Proof that the statement set compiled against the schema.
///
/// Can only be obtained through [`StatementRegistry::prepare`]. The
/// prepared statements themselves live in each connection's cache, which
/// is sized to hold all of them, so [`statement`](Self::statement) hands
/// back the already-compiled statement instead of preparing it again.
/// The registry has no state of its own and is shared across threads.
#[derive(Debug)]
pub struct StatementRegistry {
    _sealed: (),
}

impl StatementRegistry {
    /// Prepares every statement against `conn`.
    ///
    /// Also checks that each statement binds the expected number of
    /// parameters, so a statement edited out of step with its call site is
    /// caught here instead of on the first request.
    pub fn prepare(conn: &Connection) -> Result<Self, StoreError> {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);

        for statement in Statement::ALL {
            let prepared = conn
                .prepare_cached(statement.sql())
                .map_err(|source| StoreError::Prepare { statement, source })?;

            let count = prepared.parameter_count();
            if count != statement.arity() {
                return Err(StoreError::Prepare {
                    statement,
                    source: rusqlite::Error::InvalidParameterCount(count, statement.arity()),
                });
            }
            tracing::debug!(statement = statement.name(), "prepared statement");
        }

        Ok(Self { _sealed: () })
    }

    /// Returns `statement` from the cache of `conn`, which must have been
    /// passed to [`prepare`](Self::prepare).
    ///
    /// Pass a transaction (which derefs to its connection) to run the
    /// statement inside that transaction.
    pub fn statement<'c>(
        &self,
        conn: &'c Connection,
        statement: Statement,
    ) -> rusqlite::Result<CachedStatement<'c>> {
        conn.prepare_cached(statement.sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use rusqlite::StatementStatus;
    use std::collections::HashSet;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::register_functions(&conn).unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Statement::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), Statement::ALL.len());
    }

    #[test]
    fn test_prepare_against_migrated_schema() {
        let conn = migrated();
        let registry = StatementRegistry::prepare(&conn).unwrap();

        for statement in Statement::ALL {
            let stmt = registry.statement(&conn, statement).unwrap();
            assert_eq!(stmt.parameter_count(), statement.arity());
        }
    }

    #[test]
    fn test_statement_is_reused_across_calls() {
        let conn = migrated();
        let registry = StatementRegistry::prepare(&conn).unwrap();

        for _ in 0..3 {
            let mut stmt = registry.statement(&conn, Statement::GetMustang).unwrap();
            let found = stmt
                .exists([uuid::Uuid::new_v4().to_string()])
                .unwrap();
            assert!(!found);
        }

        // The run counter lives on the compiled statement, so it only
        // accumulates if every call got the same one back.
        let stmt = registry.statement(&conn, Statement::GetMustang).unwrap();
        assert_eq!(stmt.get_status(StatementStatus::Run), 3);
        assert_eq!(stmt.get_status(StatementStatus::RePrepare), 0);
    }

    #[test]
    fn test_prepare_fails_without_schema() {
        let conn = Connection::open_in_memory().unwrap();
        schema::register_functions(&conn).unwrap();

        let result = StatementRegistry::prepare(&conn);
        assert!(matches!(result, Err(StoreError::Prepare { .. })));
    }

    #[test]
    fn test_prepare_fails_without_functions() {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();

        let err = StatementRegistry::prepare(&conn).unwrap_err();
        assert!(err.to_string().starts_with("failed to prepare statement"));
    }
}
