//! Store-level errors.

use thiserror::Error;

use super::statements::Statement;

/// Errors returned by the record store.
///
/// Operation failures carry an `op` prefix naming the operation and the key
/// it ran against, e.g. `error executing get mustang - 72bc87f3-...`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No visible (non-deleted) row matched.
    #[error("{op}: the record you are attempting to find or update is not found")]
    NotFound { op: String },

    /// The insert completed without creating a row.
    #[error("{op}: no new rows were created")]
    NotCreated { op: String },

    /// The update touched no visible row.
    #[error("{op}: no rows affected")]
    NoRowsAffected { op: String },

    /// A transactional entry point was called with no transaction attached.
    #[error("no transaction attached to the context")]
    MissingTransaction,

    /// No pooled connection freed up within the busy timeout.
    #[error("{op}: database busy")]
    Busy { op: String },

    /// The request was abandoned before the statement ran.
    #[error("{op}: request cancelled")]
    Cancelled { op: String },

    /// The caller supplied an id that is not a canonical UUID.
    #[error("invalid mustang id {input:?}: {source}")]
    InvalidId {
        input: String,
        #[source]
        source: uuid::Error,
    },

    /// Driver or transport failure.
    #[error("{op}: {source}")]
    Db {
        op: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A registered statement failed to prepare against the live connection.
    #[error("failed to prepare statement {}: {source}", statement.name())]
    Prepare {
        statement: Statement,
        #[source]
        source: rusqlite::Error,
    },

    /// The database could not be opened.
    #[error("failed to open database: {0}")]
    Open(#[source] rusqlite::Error),

    /// Schema bootstrap failed.
    #[error("failed to migrate database: {0}")]
    Migrate(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn db(op: impl Into<String>, source: rusqlite::Error) -> Self {
        StoreError::Db {
            op: op.into(),
            source,
        }
    }

    /// Returns true if the underlying driver error is a uniqueness/constraint
    /// violation (e.g. a duplicate id on create).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Db { source, .. } => {
                source.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
            }
            _ => false,
        }
    }

    /// Returns true if the call gave up waiting on a connection or on
    /// another connection's write lock.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Busy { .. } => true,
            StoreError::Db { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}
