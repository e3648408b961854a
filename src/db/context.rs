//! Request-scoped context carrying an optional transaction handle.
//!
//! A [`Context`] is an immutable value. Deriving a child with
//! [`Context::with_tx`] or [`Context::with_cancellation`] returns a new
//! context and leaves the parent untouched, so siblings never observe each
//! other's associations.

use std::fmt;

use rusqlite::Transaction;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;

/// Request-scoped values threaded through store operations.
#[derive(Clone, Default)]
pub struct Context<'tx> {
    cancellation: CancellationToken,
    tx: Option<&'tx Transaction<'tx>>,
}

impl Context<'static> {
    /// An empty context: no transaction, never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// An empty context observing `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: token,
            tx: None,
        }
    }
}

impl<'tx> Context<'tx> {
    /// Returns a child context carrying `tx`.
    ///
    /// The cancellation signal of `self` is inherited.
    pub fn with_tx<'a>(&self, tx: &'a Transaction<'a>) -> Context<'a> {
        Context {
            cancellation: self.cancellation.clone(),
            tx: Some(tx),
        }
    }

    /// Retrieves the attached transaction.
    ///
    /// Fails with [`StoreError::MissingTransaction`] when none is attached.
    pub fn tx(&self) -> Result<&'tx Transaction<'tx>, StoreError> {
        self.tx.ok_or(StoreError::MissingTransaction)
    }

    pub fn has_tx(&self) -> bool {
        self.tx.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("tx", &self.has_tx())
            .finish()
    }
}
