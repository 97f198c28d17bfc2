#![forbid(unsafe_code)]

use super::support::{compact_document_tx, list_doc_ids, parse_rev};
use super::*;
use dk_core::Revision;
use tracing::info;

impl SqliteStore {
    /// Removes the listed non-winning revisions of one document in a single
    /// write transaction, then deletes attachment bodies nothing links to.
    pub async fn compact_document(
        &self,
        id: &str,
        revs: Vec<String>,
    ) -> Result<CompactStats, StoreError> {
        if revs.is_empty() {
            return Ok(CompactStats::default());
        }
        let revs = revs
            .iter()
            .map(|rev| parse_rev(rev))
            .collect::<Result<Vec<Revision>, _>>()?;
        let id = id.to_string();
        self.queue
            .enqueue_write(move |tx| compact_document_tx(tx.conn()?, &id, Some(revs)))
            .await
    }

    /// Compacts every document, one write transaction each.
    pub async fn compact(&self) -> Result<CompactStats, StoreError> {
        let ids = self.queue.enqueue_read(list_doc_ids).await?;
        let stats = self.compact_ids(ids).await?;
        info!(
            name = %self.name,
            revisions = stats.revisions_removed,
            attachments = stats.attachments_removed,
            "compaction finished"
        );
        Ok(stats)
    }

    pub(super) async fn compact_ids(&self, ids: Vec<String>) -> Result<CompactStats, StoreError> {
        let mut total = CompactStats::default();
        for id in ids {
            let stats = self
                .queue
                .enqueue_write(move |tx| compact_document_tx(tx.conn()?, &id, None))
                .await?;
            total.absorb(stats);
        }
        Ok(total)
    }
}
