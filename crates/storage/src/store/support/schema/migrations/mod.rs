#![forbid(unsafe_code)]

mod attach_escape;
mod attach_links;
mod util;

use super::super::super::StoreError;
use rusqlite::Connection;

pub(super) use util::table_exists;

/// Brings a file at `from_version` up to the current layout, one step at a time.
pub(super) fn apply(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
    if from_version < 2 {
        attach_links::apply(conn)?;
    }
    if from_version < 3 {
        attach_escape::apply(conn)?;
    }
    Ok(())
}
