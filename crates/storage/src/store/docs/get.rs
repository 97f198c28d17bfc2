#![forbid(unsafe_code)]

use super::super::support::{DocExtras, fetch_metadata, load_doc, resolve_target};
use super::super::*;
use dk_core::ids::is_local_id;
use serde_json::Value;

impl SqliteStore {
    /// Reads one document, by default its winning revision.
    ///
    /// `_local/` ids are served from the local table. A deleted winner reads
    /// as `NotFound("deleted")`; asking for a specific revision still returns
    /// its tombstone.
    pub async fn get(&self, id: &str, options: GetOptions) -> Result<Value, StoreError> {
        if is_local_id(id) {
            return self.get_local(id).await;
        }

        let id = id.to_string();
        self.queue
            .enqueue_read(move |conn| {
                let meta = fetch_metadata(conn, &id)?.ok_or(StoreError::NotFound("missing"))?;
                let target = resolve_target(&meta, options.rev.as_deref(), options.latest)?;
                let extras = DocExtras {
                    revs: options.revs,
                    conflicts: options.conflicts,
                    attachments: options.attachments,
                };
                Ok(Value::Object(load_doc(conn, &meta, &target, extras)?))
            })
            .await
    }

    pub async fn get_metadata(&self, id: &str) -> Result<Option<DocMetadata>, StoreError> {
        let id = id.to_string();
        self.queue
            .enqueue_read(move |conn| fetch_metadata(conn, &id))
            .await
    }
}
