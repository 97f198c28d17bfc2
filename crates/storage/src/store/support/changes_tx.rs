#![forbid(unsafe_code)]

use super::super::{Change, ChangesOptions, ChangesResult, DocMetadata, FilterDecision, StoreError};
use super::docs_tx::{DocExtras, load_doc};
use dk_core::{RevTree, Revision};
use rusqlite::{Connection, params};
use serde_json::Value;

struct Candidate {
    id: String,
    rev: String,
    tree_json: String,
    winning_seq: i64,
    max_seq: i64,
    deleted: bool,
}

/// One pass of the change feed: every document whose latest sequence is past
/// `options.since`, in sequence order, one entry per document.
pub(in crate::store) fn query_changes_tx(
    conn: &Connection,
    options: &ChangesOptions,
) -> Result<ChangesResult, StoreError> {
    let order = if options.descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT d.id, d.rev, d.json, d.winningseq, d.max_seq, bs.deleted \
         FROM document_store d \
         JOIN by_sequence bs ON bs.seq = d.winningseq \
         WHERE d.max_seq > ?1 \
         ORDER BY d.max_seq {order}"
    );

    let candidates = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![options.since], |row| {
            Ok(Candidate {
                id: row.get(0)?,
                rev: row.get(1)?,
                tree_json: row.get(2)?,
                winning_seq: row.get(3)?,
                max_seq: row.get(4)?,
                deleted: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out
    };

    let mut result = ChangesResult {
        results: Vec::new(),
        last_seq: options.since,
        stopped: false,
    };
    if options.limit == Some(0) {
        return Ok(result);
    }

    for candidate in candidates {
        if let Some(doc_ids) = &options.doc_ids
            && !doc_ids.contains(&candidate.id)
        {
            continue;
        }

        let meta = decode_candidate(&candidate)?;
        let mut changes = vec![candidate.rev.clone()];
        if options.conflicts {
            changes.extend(
                meta.rev_tree
                    .collect_conflicts()
                    .iter()
                    .map(Revision::to_string),
            );
        }

        let doc = if options.include_docs || options.filter.is_some() {
            let extras = DocExtras {
                revs: false,
                conflicts: options.conflicts,
                attachments: options.include_docs && options.attachments,
            };
            Some(Value::Object(load_doc(conn, &meta, &meta.rev, extras)?))
        } else {
            None
        };

        let mut change = Change {
            id: candidate.id,
            seq: candidate.max_seq,
            changes,
            deleted: candidate.deleted,
            doc,
        };

        if let Some(filter) = &options.filter {
            match filter(&change) {
                FilterDecision::Include => {}
                FilterDecision::Skip => {
                    result.last_seq = result.last_seq.max(change.seq);
                    continue;
                }
                FilterDecision::Stop => {
                    result.stopped = true;
                    break;
                }
            }
        }

        result.last_seq = result.last_seq.max(change.seq);
        if !options.include_docs {
            change.doc = None;
        }
        result.results.push(change);
        if options
            .limit
            .is_some_and(|limit| result.results.len() >= limit)
        {
            break;
        }
    }

    Ok(result)
}

fn decode_candidate(candidate: &Candidate) -> Result<DocMetadata, StoreError> {
    let rev = Revision::parse(&candidate.rev)
        .map_err(|_| StoreError::Internal("stored winning revision is invalid"))?;
    let rev_tree: RevTree = serde_json::from_str(&candidate.tree_json)?;
    Ok(DocMetadata {
        id: candidate.id.clone(),
        rev,
        rev_tree,
        winning_seq: candidate.winning_seq,
        max_seq: candidate.max_seq,
        deleted: candidate.deleted,
    })
}
