#![forbid(unsafe_code)]

use super::super::{DocMetadata, StoreError};
use super::attachments_tx::inline_attachments;
use super::json::{JsonObject, parse_body};
use super::revs::parse_rev;
use dk_core::{RevTree, Revision};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Value, json};

#[derive(Clone, Debug, PartialEq)]
pub(in crate::store) struct StoredRevision {
    pub seq: i64,
    pub body: JsonObject,
    pub deleted: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(in crate::store) struct DocExtras {
    pub revs: bool,
    pub conflicts: bool,
    pub attachments: bool,
}

pub(in crate::store) fn fetch_metadata(
    conn: &Connection,
    id: &str,
) -> Result<Option<DocMetadata>, StoreError> {
    let row = conn
        .query_row(
            "SELECT d.rev, d.json, d.winningseq, d.max_seq, COALESCE(bs.deleted, 0) \
             FROM document_store d \
             LEFT JOIN by_sequence bs ON bs.seq = d.winningseq \
             WHERE d.id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((rev, tree_json, winning_seq, max_seq, deleted)) = row else {
        return Ok(None);
    };
    let rev = Revision::parse(&rev)
        .map_err(|_| StoreError::Internal("stored winning revision is invalid"))?;
    let rev_tree: RevTree = serde_json::from_str(&tree_json)?;

    Ok(Some(DocMetadata {
        id: id.to_string(),
        rev,
        rev_tree,
        winning_seq,
        max_seq,
        deleted,
    }))
}

pub(in crate::store) fn fetch_revision(
    conn: &Connection,
    id: &str,
    rev: &str,
) -> Result<Option<StoredRevision>, StoreError> {
    let row = conn
        .query_row(
            "SELECT seq, json, deleted FROM by_sequence WHERE doc_id = ?1 AND rev = ?2",
            params![id, rev],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((seq, json, deleted)) => Ok(Some(StoredRevision {
            seq,
            body: parse_body(&json)?,
            deleted,
        })),
        None => Ok(None),
    }
}

/// Picks the revision a read should return: the explicit one (optionally
/// resolved to its branch leaf) or the winner, which must not be deleted.
pub(in crate::store) fn resolve_target(
    meta: &DocMetadata,
    rev: Option<&str>,
    latest: bool,
) -> Result<Revision, StoreError> {
    match rev {
        Some(raw) => {
            let rev = parse_rev(raw)?;
            if latest {
                Ok(meta.rev_tree.latest(&rev).unwrap_or(rev))
            } else {
                Ok(rev)
            }
        }
        None if meta.deleted => Err(StoreError::NotFound("deleted")),
        None => Ok(meta.rev.clone()),
    }
}

pub(in crate::store) fn load_doc(
    conn: &Connection,
    meta: &DocMetadata,
    target: &Revision,
    extras: DocExtras,
) -> Result<JsonObject, StoreError> {
    let rev = target.to_string();
    let stored = fetch_revision(conn, &meta.id, &rev)?.ok_or(StoreError::NotFound("missing"))?;
    let mut doc = super::json::assemble_doc(&meta.id, &rev, stored.body, stored.deleted);

    if extras.revs {
        let ids = meta
            .rev_tree
            .ancestry(target)
            .unwrap_or_else(|| vec![target.hash().to_string()]);
        doc.insert(
            "_revisions".to_string(),
            json!({ "start": target.generation(), "ids": ids }),
        );
    }
    if extras.conflicts && *target == meta.rev {
        let conflicts = meta.rev_tree.collect_conflicts();
        if !conflicts.is_empty() {
            doc.insert(
                "_conflicts".to_string(),
                Value::Array(
                    conflicts
                        .iter()
                        .map(|rev| Value::String(rev.to_string()))
                        .collect(),
                ),
            );
        }
    }
    if extras.attachments {
        inline_attachments(conn, &mut doc)?;
    }
    Ok(doc)
}

pub(in crate::store) fn count_live_docs(conn: &Connection) -> Result<u64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(1) FROM document_store d \
         JOIN by_sequence bs ON bs.seq = d.winningseq \
         WHERE bs.deleted = 0",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Highest sequence ever assigned, including ones compaction already removed.
pub(in crate::store) fn update_seq(conn: &Connection) -> Result<i64, StoreError> {
    let seq = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = 'by_sequence'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(seq.unwrap_or(0))
}

pub(in crate::store) fn list_doc_ids(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM document_store ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
