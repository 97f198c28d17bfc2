#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::super::sql::{ATTACH_SEQ_INDEXES, ATTACH_SEQ_TABLE};
use rusqlite::{Connection, params};

/// v1 → v2: introduce `attach_seq_store` and link every stored revision to
/// the attachment digests its body references.
pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(ATTACH_SEQ_TABLE)?;
    conn.execute_batch(ATTACH_SEQ_INDEXES)?;

    let revisions = {
        let mut stmt = conn.prepare("SELECT seq, json FROM by_sequence ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for (seq, json) in revisions {
        let body: serde_json::Value = serde_json::from_str(&json)?;
        let Some(attachments) = body.get("_attachments").and_then(|value| value.as_object())
        else {
            continue;
        };
        for stub in attachments.values() {
            let Some(digest) = stub.get("digest").and_then(|value| value.as_str()) else {
                continue;
            };
            conn.execute(
                "INSERT OR IGNORE INTO attach_seq_store(digest, seq) \
                 SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM attach_store WHERE digest = ?1)",
                params![digest, seq],
            )?;
        }
    }
    Ok(())
}
