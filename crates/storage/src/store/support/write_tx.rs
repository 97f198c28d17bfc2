#![forbid(unsafe_code)]

use super::super::StoreError;
use super::attachments_tx::{prepare_attachments, store_attachments_tx, stubs_object};
use super::compact_tx::remove_revisions_tx;
use super::docs_tx::{fetch_metadata, fetch_revision};
use super::json::{JsonObject, attachment_stubs};
use super::revs::{format_local_rev, new_rev_hash, parse_local_rev, parse_rev};
use dk_core::ids::DocId;
use dk_core::{RevNode, RevPath, RevTree, Revision};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;

const KNOWN_RESERVED_FIELDS: &[&str] = &["_id", "_rev", "_deleted", "_attachments", "_revisions"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::store) struct WriteContext {
    pub revs_limit: usize,
    pub deterministic_revs: bool,
    pub new_edits: bool,
}

/// An incoming document split into its reserved fields and its body.
#[derive(Clone, Debug, PartialEq)]
pub(in crate::store) struct InputDoc {
    pub id: String,
    pub rev: Option<String>,
    pub deleted: bool,
    pub body: JsonObject,
    pub attachments: Option<JsonObject>,
    /// `_revisions.ids`, newest first, when a replicator supplies history.
    pub ancestry: Option<Vec<String>>,
}

impl InputDoc {
    /// Assigns a generated id when `_id` is absent. Errors carry the id when known.
    pub fn parse(value: Value) -> Result<Self, (Option<String>, StoreError)> {
        let Value::Object(mut fields) = value else {
            return Err((
                None,
                StoreError::InvalidInput("document must be a JSON object"),
            ));
        };

        let id = match fields.remove("_id") {
            None => uuid::Uuid::new_v4().simple().to_string(),
            Some(Value::String(id)) => id,
            Some(_) => return Err((None, StoreError::InvalidInput("_id must be a string"))),
        };
        match Self::split(&id, fields) {
            Ok(doc) => Ok(doc),
            Err(err) => Err((Some(id), err)),
        }
    }

    fn split(id: &str, mut fields: JsonObject) -> Result<Self, StoreError> {
        DocId::try_new(id).map_err(|err| StoreError::InvalidInput(err.message()))?;

        if let Some(key) = fields
            .keys()
            .find(|key| key.starts_with('_') && !KNOWN_RESERVED_FIELDS.contains(&key.as_str()))
        {
            debug!(field = %key, "rejected unknown reserved field");
            return Err(StoreError::InvalidInput(
                "document contains an unknown reserved field",
            ));
        }

        let rev = match fields.remove("_rev") {
            None | Some(Value::Null) => None,
            Some(Value::String(rev)) => Some(rev),
            Some(_) => return Err(StoreError::InvalidInput("_rev must be a string")),
        };
        let deleted = match fields.remove("_deleted") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(deleted)) => deleted,
            Some(_) => return Err(StoreError::InvalidInput("_deleted must be a boolean")),
        };
        let attachments = match fields.remove("_attachments") {
            None | Some(Value::Null) => None,
            Some(Value::Object(attachments)) => Some(attachments),
            Some(_) => return Err(StoreError::InvalidInput("_attachments must be an object")),
        };
        let ancestry = match fields.remove("_revisions") {
            None | Some(Value::Null) => None,
            Some(revisions) => Some(parse_ancestry(&revisions)?),
        };

        Ok(Self {
            id: id.to_string(),
            rev,
            deleted,
            body: fields,
            attachments,
            ancestry,
        })
    }
}

fn parse_ancestry(revisions: &Value) -> Result<Vec<String>, StoreError> {
    let ids = revisions
        .get("ids")
        .and_then(Value::as_array)
        .ok_or(StoreError::InvalidInput("_revisions must carry an ids array"))?;
    ids.iter()
        .map(|id| {
            id.as_str()
                .map(str::to_string)
                .ok_or(StoreError::InvalidInput("_revisions ids must be strings"))
        })
        .collect()
}

/// Accepts or rejects one non-local document inside the caller's write
/// transaction and returns the new revision. Rejections leave no trace.
pub(in crate::store) fn write_doc_tx(
    conn: &Connection,
    ctx: &WriteContext,
    doc: InputDoc,
) -> Result<String, StoreError> {
    let existing = fetch_metadata(conn, &doc.id)?;
    let supplied = doc.rev.as_deref().map(parse_rev).transpose()?;

    let base = existing
        .as_ref()
        .map(|meta| meta.rev_tree.clone())
        .unwrap_or_default();

    let (new_rev, extended) = if ctx.new_edits {
        match (&supplied, &existing) {
            (Some(rev), Some(meta)) if *rev == meta.rev => {}
            (None, None) => {}
            _ => return Err(StoreError::Conflict),
        }
        let parent = existing.as_ref().map(|meta| meta.rev.clone());
        let hash = new_rev_hash(
            ctx.deterministic_revs,
            parent.as_ref(),
            doc.deleted,
            &doc.body,
            doc.attachments.as_ref(),
        )?;
        let new_rev = match &parent {
            Some(parent) => parent.child(hash),
            None => Revision::first(hash),
        }
        .map_err(|err| StoreError::InvalidInput(err.message()))?;
        let extended = base.extend(parent.as_ref(), &new_rev, doc.deleted, ctx.revs_limit);
        (new_rev, extended)
    } else {
        let Some(rev) = supplied else {
            return Err(StoreError::InvalidInput("new_edits=false requires _rev"));
        };
        if base.contains(&rev) {
            return Ok(rev.to_string());
        }
        let chain = replicated_chain(&rev, doc.ancestry.as_deref(), doc.deleted);
        let Some(extended) = base.graft(&chain, ctx.revs_limit) else {
            debug!(
                doc_id = %doc.id,
                rev = %rev,
                "ignored replicated revision that does not continue the stored branch"
            );
            return Ok(rev.to_string());
        };
        (rev, extended)
    };

    let previous_stubs = match &existing {
        Some(meta) => fetch_revision(conn, &meta.id, &meta.rev.to_string())?
            .and_then(|stored| attachment_stubs(&stored.body).cloned()),
        None => None,
    };
    let prepared = prepare_attachments(
        conn,
        doc.attachments.as_ref(),
        previous_stubs.as_ref(),
        new_rev.generation(),
    )?;

    let InputDoc {
        id, deleted, body, ..
    } = doc;
    let mut body = body;
    if !prepared.is_empty() {
        body.insert(
            "_attachments".to_string(),
            Value::Object(stubs_object(&prepared)),
        );
    }

    let rev_text = new_rev.to_string();
    conn.execute(
        "INSERT INTO by_sequence(json, deleted, doc_id, rev) VALUES (?1, ?2, ?3, ?4)",
        params![serde_json::to_string(&body)?, deleted, id, rev_text],
    )?;
    let seq = conn.last_insert_rowid();
    store_attachments_tx(conn, &prepared, seq)?;

    upsert_document_tx(conn, &id, &rev_text, &extended.tree, seq)?;

    if !extended.dropped.is_empty() {
        let stats = remove_revisions_tx(conn, &id, &extended.dropped)?;
        debug!(
            doc_id = %id,
            removed = stats.revisions_removed,
            "stemmed revisions past revs_limit"
        );
    }

    debug!(doc_id = %id, rev = %rev_text, seq, deleted, "accepted revision");
    Ok(rev_text)
}

/// The supplied revision plus whatever `_revisions` history leads up to it.
/// Ancestors carry no body here, so they are recorded as missing.
fn replicated_chain(rev: &Revision, ancestry: Option<&[String]>, deleted: bool) -> RevPath {
    let ancestors = match ancestry {
        Some([head, rest @ ..]) if head == rev.hash() => rest,
        _ => &[],
    };

    let mut nodes = vec![RevNode::available(rev.hash(), deleted)];
    for (hash, generation) in ancestors.iter().zip((1..rev.generation()).rev()) {
        if Revision::try_new(generation, hash.as_str()).is_err() {
            break;
        }
        nodes.push(RevNode::missing(hash.as_str()));
    }
    nodes.reverse();

    RevPath {
        start: rev.generation() - (nodes.len() as u64 - 1),
        nodes,
    }
}

fn upsert_document_tx(
    conn: &Connection,
    id: &str,
    rev: &str,
    tree: &RevTree,
    seq: i64,
) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO document_store(id, rev, json, winningseq, max_seq)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(id) DO UPDATE SET
          rev=excluded.rev,
          json=excluded.json,
          winningseq=excluded.winningseq,
          max_seq=excluded.max_seq
        "#,
        params![id, rev, serde_json::to_string(tree)?, seq],
    )?;
    Ok(())
}

/// Local documents: a flat `0-N` counter, overwritten in place, no sequences.
pub(in crate::store) fn write_local_tx(conn: &Connection, doc: InputDoc) -> Result<String, StoreError> {
    if doc.attachments.is_some() {
        return Err(StoreError::InvalidInput(
            "local documents cannot carry attachments",
        ));
    }

    let current = conn
        .query_row(
            "SELECT rev FROM local_store WHERE id = ?1",
            params![doc.id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    if doc.deleted {
        let Some(current) = current else {
            return Err(StoreError::NotFound("missing"));
        };
        if doc.rev.as_deref() != Some(current.as_str()) {
            return Err(StoreError::Conflict);
        }
        conn.execute("DELETE FROM local_store WHERE id = ?1", params![doc.id])?;
        return Ok(format_local_rev(0));
    }

    match (doc.rev.as_deref(), current.as_deref()) {
        (Some(supplied), Some(current)) if supplied == current => {}
        (None, None) => {}
        _ => return Err(StoreError::Conflict),
    }
    let counter = current.as_deref().map(parse_local_rev).transpose()?.unwrap_or(0);
    let next = counter
        .checked_add(1)
        .ok_or(StoreError::InvalidInput("local revision counter overflowed"))?;
    let rev = format_local_rev(next);

    conn.execute(
        r#"
        INSERT INTO local_store(id, rev, json) VALUES (?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET rev=excluded.rev, json=excluded.json
        "#,
        params![doc.id, rev, serde_json::to_string(&doc.body)?],
    )?;
    Ok(rev)
}
