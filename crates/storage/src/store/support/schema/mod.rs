#![forbid(unsafe_code)]

mod migrations;
mod sql;

use super::super::StoreError;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::time::Duration;
use tracing::{debug, info};

pub(in crate::store) const SCHEMA_VERSION: i64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(in crate::store) struct SchemaState {
    pub instance_id: String,
    pub version: i64,
}

pub(in crate::store) fn configure_connection(
    conn: &Connection,
    read_only: bool,
) -> Result<(), StoreError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if !read_only {
        let mode = conn.query_row("PRAGMA journal_mode = WAL", [], |row| {
            row.get::<_, String>(0)
        })?;
        debug!(journal_mode = %mode, "sqlite journal configured");
    }
    Ok(())
}

/// Creates the table set on first open, migrates older files, and returns the
/// stored instance id. Creation and migration each run in one transaction.
pub(in crate::store) fn open_or_create(conn: &mut Connection) -> Result<SchemaState, StoreError> {
    if !migrations::table_exists(conn, "metadata_store")? {
        let instance_id = uuid::Uuid::new_v4().simple().to_string();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(&sql::full_schema_sql())?;
        tx.execute(
            "INSERT INTO metadata_store(dbid, db_version) VALUES (?1, ?2)",
            params![instance_id, SCHEMA_VERSION],
        )?;
        tx.commit()?;
        info!(instance_id = %instance_id, version = SCHEMA_VERSION, "created document store schema");
        return Ok(SchemaState {
            instance_id,
            version: SCHEMA_VERSION,
        });
    }

    let state = read_state(conn)?;
    if state.version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: state.version,
            supported: SCHEMA_VERSION,
        });
    }
    if state.version == SCHEMA_VERSION {
        return Ok(state);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    migrations::apply(&tx, state.version)?;
    tx.execute(
        "UPDATE metadata_store SET db_version = ?1",
        params![SCHEMA_VERSION],
    )?;
    tx.commit()?;
    info!(from = state.version, to = SCHEMA_VERSION, "migrated document store schema");

    Ok(SchemaState {
        instance_id: state.instance_id,
        version: SCHEMA_VERSION,
    })
}

/// Read-only handles never create or migrate.
pub(in crate::store) fn read_current(conn: &Connection) -> Result<SchemaState, StoreError> {
    if !migrations::table_exists(conn, "metadata_store")? {
        return Err(StoreError::InvalidInput(
            "read-only store has no document schema",
        ));
    }
    let state = read_state(conn)?;
    if state.version != SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: state.version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(state)
}

fn read_state(conn: &Connection) -> Result<SchemaState, StoreError> {
    let row = conn
        .query_row(
            "SELECT dbid, db_version FROM metadata_store LIMIT 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    match row {
        Some((instance_id, version)) => Ok(SchemaState {
            instance_id,
            version,
        }),
        None => Err(StoreError::InvalidInput("metadata_store has no row")),
    }
}
