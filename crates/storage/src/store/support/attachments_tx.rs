#![forbid(unsafe_code)]

use super::super::StoreError;
use super::json::{JsonObject, attachment_stubs};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One attachment of an incoming revision, validated and ready to store.
#[derive(Clone, Debug, PartialEq)]
pub(in crate::store) struct PreparedAttachment {
    pub name: String,
    pub digest: String,
    pub stub: Value,
    /// `None` for stubs that point at bytes already stored.
    pub body: Option<Vec<u8>>,
}

pub(in crate::store) fn digest_of(bytes: &[u8]) -> String {
    format!("sha256-{}", BASE64.encode(Sha256::digest(bytes)))
}

/// Validates every attachment before anything is written, so a bad one fails
/// only its own document.
pub(in crate::store) fn prepare_attachments(
    conn: &Connection,
    input: Option<&JsonObject>,
    previous: Option<&JsonObject>,
    revpos: u64,
) -> Result<Vec<PreparedAttachment>, StoreError> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(input.len());
    for (name, value) in input {
        let Some(fields) = value.as_object() else {
            return Err(StoreError::InvalidInput("attachment must be a JSON object"));
        };

        if fields.get("stub").and_then(Value::as_bool) == Some(true) {
            let prior = previous
                .and_then(|stubs| stubs.get(name))
                .and_then(Value::as_object);
            let digest = fields
                .get("digest")
                .or_else(|| prior.and_then(|prior| prior.get("digest")))
                .and_then(Value::as_str)
                .map(str::to_string);
            let Some(digest) = digest else {
                return Err(StoreError::MissingStub { name: name.clone() });
            };
            if !blob_exists(conn, &digest)? {
                return Err(StoreError::MissingStub { name: name.clone() });
            }

            let mut stub = prior.cloned().unwrap_or_default();
            for (key, value) in fields {
                stub.insert(key.clone(), value.clone());
            }
            stub.insert("digest".to_string(), Value::String(digest.clone()));
            stub.insert("stub".to_string(), Value::Bool(true));
            stub.remove("data");
            out.push(PreparedAttachment {
                name: name.clone(),
                digest,
                stub: Value::Object(stub),
                body: None,
            });
            continue;
        }

        let Some(data) = fields.get("data").and_then(Value::as_str) else {
            return Err(StoreError::InvalidInput(
                "attachment must carry base64 data or be a stub",
            ));
        };
        let bytes = BASE64
            .decode(data)
            .map_err(|_| StoreError::InvalidInput("attachment data is not valid base64"))?;
        let digest = digest_of(&bytes);
        let content_type = fields
            .get("content_type")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        out.push(PreparedAttachment {
            name: name.clone(),
            stub: json!({
                "content_type": content_type,
                "digest": digest,
                "length": bytes.len(),
                "revpos": revpos,
                "stub": true,
            }),
            digest,
            body: Some(bytes),
        });
    }
    Ok(out)
}

pub(in crate::store) fn stubs_object(prepared: &[PreparedAttachment]) -> JsonObject {
    prepared
        .iter()
        .map(|attachment| (attachment.name.clone(), attachment.stub.clone()))
        .collect()
}

/// Inserts new bodies (insert-if-absent by digest) and links every
/// attachment, stub or not, to `seq`.
pub(in crate::store) fn store_attachments_tx(
    conn: &Connection,
    prepared: &[PreparedAttachment],
    seq: i64,
) -> Result<(), StoreError> {
    for attachment in prepared {
        if let Some(body) = attachment.body.as_deref() {
            conn.execute(
                "INSERT OR IGNORE INTO attach_store(digest, escaped, body) VALUES (?1, 0, ?2)",
                params![attachment.digest, body],
            )?;
        }
        conn.execute(
            "INSERT OR IGNORE INTO attach_seq_store(digest, seq) VALUES (?1, ?2)",
            params![attachment.digest, seq],
        )?;
    }
    Ok(())
}

pub(in crate::store) fn blob_exists(conn: &Connection, digest: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM attach_store WHERE digest = ?1",
            params![digest],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn load_attachment(
    conn: &Connection,
    digest: &str,
) -> Result<Option<Vec<u8>>, StoreError> {
    let row = conn
        .query_row(
            "SELECT escaped, body FROM attach_store WHERE digest = ?1",
            params![digest],
            |row| {
                let escaped = row.get::<_, bool>(0)?;
                let body = match row.get_ref(1)? {
                    ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes.to_vec(),
                    _ => Vec::new(),
                };
                Ok((escaped, body))
            },
        )
        .optional()?;

    match row {
        Some((true, text)) => BASE64
            .decode(text)
            .map(Some)
            .map_err(|_| StoreError::Internal("escaped attachment body is not base64")),
        Some((false, bytes)) => Ok(Some(bytes)),
        None => Ok(None),
    }
}

/// Replaces every stub in `doc._attachments` with inline base64 data.
pub(in crate::store) fn inline_attachments(
    conn: &Connection,
    doc: &mut JsonObject,
) -> Result<(), StoreError> {
    let Some(stubs) = attachment_stubs(doc) else {
        return Ok(());
    };

    let mut inlined = JsonObject::with_capacity(stubs.len());
    for (name, stub) in stubs {
        let mut fields = stub.as_object().cloned().unwrap_or_default();
        let Some(digest) = fields.get("digest").and_then(Value::as_str) else {
            inlined.insert(name.clone(), Value::Object(fields));
            continue;
        };
        let bytes = load_attachment(conn, digest)?
            .ok_or(StoreError::NotFound("missing attachment"))?;
        fields.remove("stub");
        fields.insert("data".to_string(), Value::String(BASE64.encode(bytes)));
        inlined.insert(name.clone(), Value::Object(fields));
    }
    doc.insert("_attachments".to_string(), Value::Object(inlined));
    Ok(())
}

/// Deletes bodies among `digests` that no link row references any more. Runs
/// in the same transaction as the link deletion that orphaned them.
pub(in crate::store) fn sweep_orphans_tx(
    conn: &Connection,
    digests: &BTreeSet<String>,
) -> Result<usize, StoreError> {
    let mut removed = 0;
    for digest in digests {
        removed += conn.execute(
            "DELETE FROM attach_store WHERE digest = ?1 \
             AND NOT EXISTS (SELECT 1 FROM attach_seq_store WHERE digest = ?1)",
            params![digest],
        )?;
    }
    Ok(removed)
}
