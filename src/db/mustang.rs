//! Record store for the `mustangs` table.
//!
//! Each operation has a plain entry point that runs on a connection taken
//! from the store's pool and a `_tx` entry point that runs inside the
//! transaction attached to the [`Context`]. Both converge on one
//! implementation parameterized by `use_tx`. The `_tx` forms fail closed
//! with [`StoreError::MissingTransaction`] instead of falling back to a
//! pooled connection.

use std::fmt;
use std::sync::Arc;

use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use super::context::Context;
use super::error::StoreError;
use super::pool::Pool;
use super::statements::{Statement, StatementRegistry};
use crate::pb::{CreateMustangRequest, MustangResponse, UpdateMustangRequest};

/// A row of the `mustangs` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mustang {
    pub id: Uuid,
    pub name: String,
}

/// Wire messages that carry a mustang name.
pub trait HasName {
    fn name(&self) -> &str;
}

impl HasName for CreateMustangRequest {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HasName for UpdateMustangRequest {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Mustang {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Builds a mustang from a canonical string id and a wire message.
    pub fn from_request(id: &str, request: &impl HasName) -> Result<Self, StoreError> {
        Ok(Self {
            id: parse_id(id)?,
            name: request.name().to_string(),
        })
    }

    /// Converts into the wire response.
    pub fn to_response(&self) -> MustangResponse {
        MustangResponse {
            id: self.id.hyphenated().to_string(),
            name: self.name.clone(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let text: String = row.get(0)?;
        let id = Uuid::parse_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id,
            name: row.get(1)?,
        })
    }
}

impl fmt::Display for Mustang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

/// Parses a canonical string id.
pub fn parse_id(input: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(input).map_err(|source| StoreError::InvalidId {
        input: input.to_string(),
        source,
    })
}

/// Data access for mustangs.
#[derive(Clone)]
pub struct MustangService {
    pool: Arc<Pool>,
    stmts: Arc<StatementRegistry>,
}

impl MustangService {
    pub(crate) fn new(pool: Arc<Pool>, stmts: Arc<StatementRegistry>) -> Self {
        Self { pool, stmts }
    }

    /// Fetches a single visible mustang.
    pub fn get(&self, ctx: &Context<'_>, id: Uuid) -> Result<Mustang, StoreError> {
        self.get_scoped(ctx, false, id)
    }

    /// Fetches a single visible mustang inside the transaction from `ctx`.
    pub fn get_tx(&self, ctx: &Context<'_>, id: Uuid) -> Result<Mustang, StoreError> {
        self.get_scoped(ctx, true, id)
    }

    /// Creates a new mustang.
    pub fn create(&self, ctx: &Context<'_>, input: &Mustang) -> Result<(), StoreError> {
        self.create_scoped(ctx, false, input)
    }

    /// Creates a new mustang inside the transaction from `ctx`.
    pub fn create_tx(&self, ctx: &Context<'_>, input: &Mustang) -> Result<(), StoreError> {
        self.create_scoped(ctx, true, input)
    }

    /// Renames a visible mustang.
    pub fn update(&self, ctx: &Context<'_>, input: &Mustang) -> Result<(), StoreError> {
        self.update_scoped(ctx, false, input)
    }

    /// Renames a visible mustang inside the transaction from `ctx`.
    pub fn update_tx(&self, ctx: &Context<'_>, input: &Mustang) -> Result<(), StoreError> {
        self.update_scoped(ctx, true, input)
    }

    /// Soft deletes a visible mustang by setting `deleted_at`.
    pub fn delete(&self, ctx: &Context<'_>, id: Uuid) -> Result<(), StoreError> {
        self.delete_scoped(ctx, false, id)
    }

    /// Soft deletes a visible mustang inside the transaction from `ctx`.
    pub fn delete_tx(&self, ctx: &Context<'_>, id: Uuid) -> Result<(), StoreError> {
        self.delete_scoped(ctx, true, id)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    fn get_scoped(
        &self,
        ctx: &Context<'_>,
        use_tx: bool,
        id: Uuid,
    ) -> Result<Mustang, StoreError> {
        let op = || format!("error executing get mustang - {id}");

        self.with_conn(ctx, use_tx, &op, |conn| {
            let mut stmt = self
                .stmts
                .statement(conn, Statement::GetMustang)
                .map_err(|e| StoreError::db(op(), e))?;

            stmt.query_row(params![id.to_string()], Mustang::from_row)
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound { op: op() },
                    e => StoreError::db(op(), e),
                })
        })
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    fn create_scoped(
        &self,
        ctx: &Context<'_>,
        use_tx: bool,
        input: &Mustang,
    ) -> Result<(), StoreError> {
        let op = || format!("error executing create mustang - {input}");

        self.with_conn(ctx, use_tx, &op, |conn| {
            let mut stmt = self
                .stmts
                .statement(conn, Statement::CreateMustang)
                .map_err(|e| StoreError::db(op(), e))?;

            let rows = stmt
                .execute(params![input.id.to_string(), input.name])
                .map_err(|e| StoreError::db(op(), e))?;

            if rows == 0 {
                return Err(StoreError::NotCreated { op: op() });
            }
            Ok(())
        })
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    fn update_scoped(
        &self,
        ctx: &Context<'_>,
        use_tx: bool,
        input: &Mustang,
    ) -> Result<(), StoreError> {
        let op = || format!("error executing update mustang - {input}");

        self.with_conn(ctx, use_tx, &op, |conn| {
            let mut stmt = self
                .stmts
                .statement(conn, Statement::UpdateMustang)
                .map_err(|e| StoreError::db(op(), e))?;

            let rows = stmt
                .execute(params![input.name, input.id.to_string()])
                .map_err(|e| StoreError::db(op(), e))?;

            if rows == 0 {
                return Err(StoreError::NoRowsAffected { op: op() });
            }
            Ok(())
        })
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    fn delete_scoped(&self, ctx: &Context<'_>, use_tx: bool, id: Uuid) -> Result<(), StoreError> {
        let op = || format!("error executing delete mustang - {id}");

        self.with_conn(ctx, use_tx, &op, |conn| {
            let mut stmt = self
                .stmts
                .statement(conn, Statement::DeleteMustang)
                .map_err(|e| StoreError::db(op(), e))?;

            let rows = stmt
                .execute(params![id.to_string()])
                .map_err(|e| StoreError::db(op(), e))?;

            if rows == 0 {
                return Err(StoreError::NotFound { op: op() });
            }
            Ok(())
        })
    }

    /// Runs `f` against the transaction from `ctx` (when `use_tx`) or a
    /// pooled connection.
    fn with_conn<T>(
        &self,
        ctx: &Context<'_>,
        use_tx: bool,
        op: &dyn Fn() -> String,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if use_tx {
            let tx = ctx.tx()?;
            if ctx.is_cancelled() {
                return Err(StoreError::Cancelled { op: op() });
            }
            f(&**tx)
        } else {
            let conn = self
                .pool
                .acquire()
                .ok_or_else(|| StoreError::Busy { op: op() })?;
            // Checked after acquiring, since that may wait.
            if ctx.is_cancelled() {
                return Err(StoreError::Cancelled { op: op() });
            }
            f(&*conn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Store, StoreOptions};
    use crate::pb::{CreateMustangRequest, UpdateMustangRequest};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const ID: &str = "72bc87f3-4a9f-4d05-93fe-844d3cd94c65";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    fn foobar() -> Mustang {
        Mustang::new(id(), "Foobar")
    }

    #[test]
    fn test_from_request() {
        let request = CreateMustangRequest {
            name: "Foobar".to_string(),
        };

        let mustang = Mustang::from_request(ID, &request).unwrap();
        assert_eq!(mustang.id, id());
        assert_eq!(mustang.name, "Foobar");
    }

    #[test]
    fn test_from_request_invalid_id() {
        let request = UpdateMustangRequest {
            id: "nope".to_string(),
            name: "Foobar".to_string(),
        };

        let result = Mustang::from_request(&request.id, &request);
        assert!(matches!(result, Err(StoreError::InvalidId { .. })));
    }

    #[test]
    fn test_to_response() {
        let response = Mustang::new(id(), "foobar").to_response();
        assert_eq!(response.id, ID);
        assert_eq!(response.name, "foobar");
    }

    #[test]
    fn test_get_without_tx() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        let mustang = store.mustangs().get(&ctx, id()).unwrap();
        assert_eq!(mustang, foobar());
    }

    #[test]
    fn test_get_with_tx() {
        let store = Store::open_in_memory().unwrap();
        store
            .mustangs()
            .create(&Context::background(), &foobar())
            .unwrap();

        let mustang = store
            .transaction(|tx| {
                let ctx = Context::background().with_tx(tx);
                store.mustangs().get_tx(&ctx, id())
            })
            .unwrap();
        assert_eq!(mustang.name, "Foobar");
    }

    #[test]
    fn test_get_not_found() {
        let store = Store::open_in_memory().unwrap();

        let err = store
            .mustangs()
            .get(&Context::background(), id())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "error executing get mustang - 72bc87f3-4a9f-4d05-93fe-844d3cd94c65: \
             the record you are attempting to find or update is not found"
        );
    }

    #[test]
    fn test_create_duplicate() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        let err = store
            .mustangs()
            .create(&ctx, &Mustang::new(id(), "Other"))
            .unwrap_err();
        assert!(
            matches!(err, StoreError::NotCreated { .. }) || err.is_constraint_violation(),
            "unexpected error: {err}"
        );
        assert!(err.to_string().starts_with(
            "error executing create mustang - 72bc87f3-4a9f-4d05-93fe-844d3cd94c65 (Other)"
        ));

        // The first row is untouched.
        assert_eq!(store.mustangs().get(&ctx, id()).unwrap().name, "Foobar");
    }

    #[test]
    fn test_create_with_tx_commits() {
        let store = Store::open_in_memory().unwrap();

        store
            .transaction(|tx| {
                let ctx = Context::background().with_tx(tx);
                store.mustangs().create_tx(&ctx, &foobar())
            })
            .unwrap();

        let mustang = store.mustangs().get(&Context::background(), id()).unwrap();
        assert_eq!(mustang, foobar());
    }

    #[test]
    fn test_create_with_tx_rolls_back() {
        let store = Store::open_in_memory().unwrap();

        let result: Result<(), StoreError> = store.transaction(|tx| {
            let ctx = Context::background().with_tx(tx);
            store.mustangs().create_tx(&ctx, &foobar())?;
            // visible inside the transaction
            store.mustangs().get_tx(&ctx, id())?;
            store.mustangs().delete_tx(&ctx, Uuid::new_v4())
        });
        assert!(matches!(result, Err(StoreError::NotFound { .. })));

        let err = store
            .mustangs()
            .get(&Context::background(), id())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_update() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        store
            .mustangs()
            .update(&ctx, &Mustang::new(id(), "Baz"))
            .unwrap();

        let mustang = store.mustangs().get(&ctx, id()).unwrap();
        assert_eq!(mustang.id, id());
        assert_eq!(mustang.name, "Baz");
    }

    #[test]
    fn test_update_with_tx() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        store
            .transaction(|tx| {
                let ctx = ctx.with_tx(tx);
                store.mustangs().update_tx(&ctx, &Mustang::new(id(), "Baz"))
            })
            .unwrap();

        assert_eq!(store.mustangs().get(&ctx, id()).unwrap().name, "Baz");
    }

    #[test]
    fn test_update_no_rows() {
        let store = Store::open_in_memory().unwrap();

        let err = store
            .mustangs()
            .update(&Context::background(), &foobar())
            .unwrap_err();
        assert!(matches!(err, StoreError::NoRowsAffected { .. }));
        assert_eq!(
            err.to_string(),
            "error executing update mustang - 72bc87f3-4a9f-4d05-93fe-844d3cd94c65 (Foobar): no rows affected"
        );
    }

    #[test]
    fn test_update_deleted() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();
        store.mustangs().delete(&ctx, id()).unwrap();

        let err = store
            .mustangs()
            .update(&ctx, &Mustang::new(id(), "Baz"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NoRowsAffected { .. }));
    }

    #[test]
    fn test_delete_is_soft() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        store.mustangs().delete(&ctx, id()).unwrap();

        let err = store.mustangs().get(&ctx, id()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let row = store.raw_row(id()).unwrap().unwrap();
        assert_eq!(row.name, "Foobar");
        assert!(row.deleted_at.is_some());
    }

    #[test]
    fn test_delete_with_tx() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        store
            .transaction(|tx| store.mustangs().delete_tx(&ctx.with_tx(tx), id()))
            .unwrap();

        assert!(matches!(
            store.mustangs().get(&ctx, id()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_non_existent() {
        let store = Store::open_in_memory().unwrap();

        let err = store
            .mustangs()
            .delete(&Context::background(), id())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "error executing delete mustang - 72bc87f3-4a9f-4d05-93fe-844d3cd94c65: \
             the record you are attempting to find or update is not found"
        );
    }

    #[test]
    fn test_delete_twice() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        store.mustangs().create(&ctx, &foobar()).unwrap();

        store.mustangs().delete(&ctx, id()).unwrap();
        let err = store.mustangs().delete(&ctx, id()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_tx_entry_points_require_transaction() {
        let store = Store::open_in_memory().unwrap();
        let ctx = Context::background();
        let mustangs = store.mustangs();

        assert!(matches!(
            mustangs.get_tx(&ctx, id()),
            Err(StoreError::MissingTransaction)
        ));
        assert!(matches!(
            mustangs.create_tx(&ctx, &foobar()),
            Err(StoreError::MissingTransaction)
        ));
        assert!(matches!(
            mustangs.update_tx(&ctx, &foobar()),
            Err(StoreError::MissingTransaction)
        ));
        assert!(matches!(
            mustangs.delete_tx(&ctx, id()),
            Err(StoreError::MissingTransaction)
        ));

        // Nothing fell back to a pooled connection.
        assert!(store.raw_row(id()).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_context() {
        let store = Store::open_in_memory().unwrap();
        let token = CancellationToken::new();
        let ctx = Context::with_cancellation(token.clone());
        token.cancel();

        let err = store.mustangs().create(&ctx, &foobar()).unwrap_err();
        assert!(matches!(err, StoreError::Cancelled { .. }));
        assert!(store.raw_row(id()).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_context_with_tx() {
        let store = Store::open_in_memory().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = store.transaction(|tx| {
            let ctx = Context::with_cancellation(token.clone()).with_tx(tx);
            store.mustangs().create_tx(&ctx, &foobar())
        });

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled { .. }));
        assert!(err.to_string().starts_with("error executing create mustang"));
        assert!(store.raw_row(id()).unwrap().is_none());
    }

    #[test]
    fn test_plain_call_inside_transaction_is_busy() {
        let store = Store::open_in_memory_with(StoreOptions {
            busy_timeout: Duration::from_millis(50),
            ..StoreOptions::default()
        })
        .unwrap();

        let result = store.transaction(|tx| {
            store
                .mustangs()
                .create_tx(&Context::background().with_tx(tx), &foobar())?;
            store.mustangs().get(&Context::background(), id())
        });

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Busy { .. }));
        assert!(err.is_busy());
        assert!(store.raw_row(id()).unwrap().is_none());
    }
}
