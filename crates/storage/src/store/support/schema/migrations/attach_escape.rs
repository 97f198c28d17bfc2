#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::super::sql::BY_SEQ_DELETED_INDEX;
use super::util::add_column_if_missing;
use rusqlite::Connection;

/// v2 → v3: bodies written before this version hold base64 text, so existing
/// rows default to escaped; new rows store raw bytes.
pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    add_column_if_missing(conn, "attach_store", "escaped", "INTEGER NOT NULL DEFAULT 1")?;
    conn.execute_batch(BY_SEQ_DELETED_INDEX)?;
    Ok(())
}
