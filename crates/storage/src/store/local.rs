#![forbid(unsafe_code)]

use super::support::{InputDoc, assemble_doc, parse_body, write_local_tx};
use super::*;
use dk_core::ids::is_local_id;
use rusqlite::{OptionalExtension, params};
use serde_json::{Value, json};

impl SqliteStore {
    pub async fn get_local(&self, id: &str) -> Result<Value, StoreError> {
        let id = id.to_string();
        self.queue
            .enqueue_read(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT rev, json FROM local_store WHERE id = ?1",
                        params![id],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                    )
                    .optional()?;
                let (rev, json) = row.ok_or(StoreError::NotFound("missing"))?;
                Ok(Value::Object(assemble_doc(
                    &id,
                    &rev,
                    parse_body(&json)?,
                    false,
                )))
            })
            .await
    }

    /// Stores a `_local/` document. It never enters the change feed.
    pub async fn put_local(&self, doc: Value) -> Result<String, StoreError> {
        let doc = InputDoc::parse(doc).map_err(|(_, err)| err)?;
        if !is_local_id(&doc.id) {
            return Err(StoreError::InvalidInput(
                "local document ids must start with _local/",
            ));
        }
        self.queue
            .enqueue_write(move |tx| write_local_tx(tx.conn()?, doc))
            .await
    }

    pub async fn remove_local(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        let doc = json!({ "_id": id, "_rev": rev, "_deleted": true });
        self.put_local(doc).await.map(|_| ())
    }
}
