#![forbid(unsafe_code)]

use super::super::support::fetch_metadata;
use super::super::*;
use dk_core::RevTree;

impl SqliteStore {
    pub async fn get_revision_tree(&self, id: &str) -> Result<RevTree, StoreError> {
        let id = id.to_string();
        self.queue
            .enqueue_read(move |conn| {
                fetch_metadata(conn, &id)?
                    .map(|meta| meta.rev_tree)
                    .ok_or(StoreError::NotFound("missing"))
            })
            .await
    }
}
