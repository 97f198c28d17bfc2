#![forbid(unsafe_code)]

use super::super::{CompactStats, StoreError};
use super::attachments_tx::sweep_orphans_tx;
use super::docs_tx::fetch_metadata;
use dk_core::Revision;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use tracing::debug;

/// Deletes the by-sequence rows of `revs`, their attachment links, and any
/// attachment body left without links. Revisions already gone are skipped.
pub(in crate::store) fn remove_revisions_tx(
    conn: &Connection,
    doc_id: &str,
    revs: &[Revision],
) -> Result<CompactStats, StoreError> {
    let mut seqs = Vec::with_capacity(revs.len());
    for rev in revs {
        let seq = conn
            .query_row(
                "SELECT seq FROM by_sequence WHERE doc_id = ?1 AND rev = ?2",
                params![doc_id, rev.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if let Some(seq) = seq {
            seqs.push(seq);
        }
    }

    let mut digests = BTreeSet::new();
    for seq in &seqs {
        let mut stmt = conn.prepare("SELECT digest FROM attach_seq_store WHERE seq = ?1")?;
        let rows = stmt.query_map(params![seq], |row| row.get::<_, String>(0))?;
        for digest in rows {
            digests.insert(digest?);
        }
        conn.execute("DELETE FROM attach_seq_store WHERE seq = ?1", params![seq])?;
        conn.execute("DELETE FROM by_sequence WHERE seq = ?1", params![seq])?;
    }

    let attachments_removed = sweep_orphans_tx(conn, &digests)?;
    Ok(CompactStats {
        revisions_removed: seqs.len(),
        attachments_removed,
    })
}

/// Compacts one document. `revs = None` asks the stored tree for its obsolete
/// revisions. The winning revision is never removed.
pub(in crate::store) fn compact_document_tx(
    conn: &Connection,
    doc_id: &str,
    revs: Option<Vec<Revision>>,
) -> Result<CompactStats, StoreError> {
    let Some(meta) = fetch_metadata(conn, doc_id)? else {
        return Ok(CompactStats::default());
    };

    let revs = revs
        .unwrap_or_else(|| meta.rev_tree.obsolete_revs())
        .into_iter()
        .filter(|rev| *rev != meta.rev)
        .collect::<Vec<_>>();
    if revs.is_empty() {
        return Ok(CompactStats::default());
    }

    let mut tree = meta.rev_tree.clone();
    if tree.mark_missing(&revs) > 0 {
        conn.execute(
            "UPDATE document_store SET json = ?2 WHERE id = ?1",
            params![doc_id, serde_json::to_string(&tree)?],
        )?;
    }

    let stats = remove_revisions_tx(conn, doc_id, &revs)?;
    debug!(
        doc_id,
        revisions = stats.revisions_removed,
        attachments = stats.attachments_removed,
        "compacted document"
    );
    Ok(stats)
}
