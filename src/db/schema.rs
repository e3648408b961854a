//! Schema bootstrap and the SQL functions the statements rely on.
//!
//! Ids are stored as 16-byte blobs and cross the query boundary in their
//! canonical text form: `uuid_to_bin(text)` on the way in and
//! `bin_to_uuid(blob)` on the way out.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use uuid::Uuid;

use super::error::StoreError;

const MIGRATION: &str = "
CREATE TABLE IF NOT EXISTS mustangs (
    mustang_id BLOB      NOT NULL PRIMARY KEY CHECK (length(mustang_id) = 16),
    name       TEXT      NOT NULL CHECK (name <> ''),
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    deleted_at TIMESTAMP NULL
);
";

/// Installs `uuid_to_bin` and `bin_to_uuid` on `conn`.
pub fn register_functions(conn: &Connection) -> Result<(), StoreError> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("uuid_to_bin", 1, flags, |ctx| {
        let text: String = ctx.get(0)?;
        let id = Uuid::parse_str(&text)
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(id.as_bytes().to_vec())
    })
    .map_err(StoreError::Open)?;

    conn.create_scalar_function("bin_to_uuid", 1, flags, |ctx| {
        let bytes: Vec<u8> = ctx.get(0)?;
        let id = Uuid::from_slice(&bytes)
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(id.hyphenated().to_string())
    })
    .map_err(StoreError::Open)?;

    Ok(())
}

/// Applies the (idempotent) schema.
pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(MIGRATION).map_err(StoreError::Migrate)?;
    tracing::debug!("schema migrated");
    Ok(())
}
