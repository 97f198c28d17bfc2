#![forbid(unsafe_code)]

use super::super::support::{DocExtras, count_live_docs, fetch_metadata, load_doc};
use super::super::*;
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

impl SqliteStore {
    /// Lists non-deleted documents in id order, or the rows for an explicit
    /// key set (missing and deleted ids included) in key order.
    pub async fn all_docs(&self, options: AllDocsOptions) -> Result<AllDocsResponse, StoreError> {
        self.queue
            .enqueue_read(move |conn| all_docs_tx(conn, &options))
            .await
    }
}

fn all_docs_tx(conn: &Connection, options: &AllDocsOptions) -> Result<AllDocsResponse, StoreError> {
    let total_rows = count_live_docs(conn)?;
    let extras = DocExtras {
        revs: false,
        conflicts: options.conflicts,
        attachments: options.attachments,
    };
    let rows = match &options.keys {
        Some(keys) => key_rows(conn, keys, options, extras)?,
        None => range_rows(conn, options, extras)?,
    };
    Ok(AllDocsResponse {
        total_rows,
        offset: options.skip,
        rows,
    })
}

fn key_rows(
    conn: &Connection,
    keys: &[String],
    options: &AllDocsOptions,
    extras: DocExtras,
) -> Result<Vec<AllDocsRow>, StoreError> {
    let ordered: Box<dyn Iterator<Item = &String>> = if options.descending {
        Box::new(keys.iter().rev())
    } else {
        Box::new(keys.iter())
    };

    let mut rows = Vec::new();
    for key in ordered
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX))
    {
        let Some(meta) = fetch_metadata(conn, key)? else {
            rows.push(AllDocsRow {
                key: key.clone(),
                id: None,
                value: None,
                doc: None,
                error: Some("not_found"),
            });
            continue;
        };

        let doc = if options.include_docs && !meta.deleted {
            Some(Value::Object(load_doc(conn, &meta, &meta.rev, extras)?))
        } else {
            None
        };
        rows.push(AllDocsRow {
            key: key.clone(),
            id: Some(meta.id.clone()),
            value: Some(AllDocsValue {
                rev: meta.rev.to_string(),
                deleted: meta.deleted,
            }),
            doc,
            error: None,
        });
    }
    Ok(rows)
}

fn range_rows(
    conn: &Connection,
    options: &AllDocsOptions,
    extras: DocExtras,
) -> Result<Vec<AllDocsRow>, StoreError> {
    let mut sql = String::from(
        "SELECT d.id, d.rev FROM document_store d \
         JOIN by_sequence bs ON bs.seq = d.winningseq \
         WHERE bs.deleted = 0",
    );
    let mut params: Vec<SqlValue> = Vec::new();
    append_range_clause(&mut sql, &mut params, options);
    sql.push_str(if options.descending {
        " ORDER BY d.id DESC"
    } else {
        " ORDER BY d.id ASC"
    });
    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(SqlValue::Integer(
        options
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX)),
    ));
    params.push(SqlValue::Integer(
        i64::try_from(options.skip).unwrap_or(i64::MAX),
    ));

    let listed = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out
    };

    let mut rows = Vec::with_capacity(listed.len());
    for (id, rev) in listed {
        let doc = if options.include_docs {
            match fetch_metadata(conn, &id)? {
                Some(meta) => Some(Value::Object(load_doc(conn, &meta, &meta.rev, extras)?)),
                None => None,
            }
        } else {
            None
        };
        rows.push(AllDocsRow {
            key: id.clone(),
            id: Some(id),
            value: Some(AllDocsValue {
                rev,
                deleted: false,
            }),
            doc,
            error: None,
        });
    }
    Ok(rows)
}

/// In descending scans `start_key` is the upper bound and `end_key` the lower.
fn append_range_clause(sql: &mut String, params: &mut Vec<SqlValue>, options: &AllDocsOptions) {
    let end_op = match (options.descending, options.inclusive_end) {
        (false, true) => "<=",
        (false, false) => "<",
        (true, true) => ">=",
        (true, false) => ">",
    };
    let start_op = if options.descending { "<=" } else { ">=" };

    if let Some(start) = &options.start_key {
        sql.push_str(&format!(" AND d.id {start_op} ?"));
        params.push(SqlValue::Text(start.clone()));
    }
    if let Some(end) = &options.end_key {
        sql.push_str(&format!(" AND d.id {end_op} ?"));
        params.push(SqlValue::Text(end.clone()));
    }
}
