#![forbid(unsafe_code)]

use super::super::support::{
    attachment_stubs, fetch_metadata, fetch_revision, load_attachment, resolve_target,
};
use super::super::*;
use serde_json::Value;

impl SqliteStore {
    /// Raw bytes of attachment `name` on `rev`, or on the winning revision.
    pub async fn get_attachment(
        &self,
        id: &str,
        name: &str,
        rev: Option<&str>,
    ) -> Result<Vec<u8>, StoreError> {
        let id = id.to_string();
        let name = name.to_string();
        let rev = rev.map(str::to_string);
        self.queue
            .enqueue_read(move |conn| {
                let meta = fetch_metadata(conn, &id)?.ok_or(StoreError::NotFound("missing"))?;
                let target = resolve_target(&meta, rev.as_deref(), false)?;
                let stored = fetch_revision(conn, &id, &target.to_string())?
                    .ok_or(StoreError::NotFound("missing"))?;
                let digest = attachment_stubs(&stored.body)
                    .and_then(|stubs| stubs.get(&name))
                    .and_then(|stub| stub.get("digest"))
                    .and_then(Value::as_str)
                    .ok_or(StoreError::NotFound("missing attachment"))?;
                load_attachment(conn, digest)?.ok_or(StoreError::NotFound("missing attachment"))
            })
            .await
    }
}
