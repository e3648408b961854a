//! Transaction-aware data access for mustang records.
//!
//! ## Architecture
//!
//! ```text
//! +---------+        +----------------+
//! |  Store  | -----> | MustangService |  <- get/create/update/delete (+ _tx)
//! +---------+        +----------------+
//!      |                 |         |
//!      |                 v         v
//!      |        +-------------+  +-----------+
//!      |        | Statement   |  | Context   |  <- carries the caller's
//!      |        | Registry    |  | (tx, ...) |     transaction, if any
//!      |        +-------------+  +-----------+
//!      v
//! +-------------------------------------+
//! | Pool: [Mutex<rusqlite::Connection>] |
//! +-------------------------------------+
//! ```
//!
//! ## Terminology
//!
//! - **Store**: owns the pool, bootstraps schema and statements
//! - **Pool**: fixed set of connections, each with its own statement cache;
//!   a caller that finds none free within the busy timeout gets `Busy`
//! - **Context**: immutable request-scoped carrier for a transaction handle
//! - **Statement Registry**: the fixed set of prepared statements
//! - **Soft delete**: `deleted_at` is set; the row stays but is invisible

mod context;
mod error;
mod mustang;
mod pool;
pub mod schema;
mod statements;
mod store;

pub use context::Context;
pub use error::StoreError;
pub use mustang::{HasName, Mustang, MustangService, parse_id};
pub use pool::StoreOptions;
pub use statements::{Statement, StatementRegistry};
pub use store::{Store, StoredRow};
