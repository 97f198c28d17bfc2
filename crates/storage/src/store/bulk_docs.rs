#![forbid(unsafe_code)]

use super::support::{InputDoc, write_doc_tx, write_local_tx};
use super::*;
use dk_core::ids::is_local_id;
use serde_json::{Value, json};
use tracing::{debug, warn};

impl SqliteStore {
    /// Writes a batch in one transaction.
    ///
    /// Results follow input order. A rejected document (conflict, bad input,
    /// missing attachment stub) is recorded in its slot and leaves no trace on
    /// disk; the rest of the batch still commits. Engine failures roll the
    /// whole batch back and are returned as the call's error.
    pub async fn bulk_docs(
        &self,
        request: BulkDocsRequest,
    ) -> Result<Vec<DocWriteResult>, StoreError> {
        let ctx = self.write_context(request.new_edits);
        let docs = request.docs;

        let (results, written) = self
            .queue
            .enqueue_write(move |tx| {
                let conn = tx.conn()?;
                let mut results = Vec::with_capacity(docs.len());
                let mut written = Vec::new();

                for value in docs {
                    let doc = match InputDoc::parse(value) {
                        Ok(doc) => doc,
                        Err((id, err)) => {
                            results.push(DocWriteResult {
                                id,
                                result: Err(err),
                            });
                            continue;
                        }
                    };

                    let id = doc.id.clone();
                    let local = is_local_id(&id);
                    let outcome = if local {
                        write_local_tx(conn, doc)
                    } else {
                        write_doc_tx(conn, &ctx, doc)
                    };

                    match outcome {
                        Ok(rev) => {
                            if !local && !written.contains(&id) {
                                written.push(id.clone());
                            }
                            results.push(DocWriteResult {
                                id: Some(id),
                                result: Ok(rev),
                            });
                        }
                        Err(err) if err.is_per_document() => {
                            debug!(doc_id = %id, code = err.code(), "document rejected");
                            results.push(DocWriteResult {
                                id: Some(id),
                                result: Err(err),
                            });
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok((results, written))
            })
            .await?;

        if !written.is_empty() {
            self.registry.notify(&self.name);
            if self.auto_compaction
                && let Err(err) = self.compact_ids(written).await
            {
                warn!(error = %err, "auto-compaction after bulk write failed");
            }
        }
        Ok(results)
    }

    /// Writes one document and returns its new revision.
    pub async fn put(&self, doc: Value) -> Result<String, StoreError> {
        let mut results = self.bulk_docs(BulkDocsRequest::new(vec![doc])).await?;
        match results.pop() {
            Some(result) => result.result,
            None => Err(StoreError::Internal("bulk write returned no result")),
        }
    }

    /// Writes a deletion revision on top of `rev`.
    pub async fn remove(&self, id: &str, rev: &str) -> Result<String, StoreError> {
        self.put(json!({ "_id": id, "_rev": rev, "_deleted": true }))
            .await
    }
}
