#![forbid(unsafe_code)]

use super::super::StoreError;
use serde_json::{Map, Value};

pub(in crate::store) type JsonObject = Map<String, Value>;

pub(in crate::store) fn parse_body(json: &str) -> Result<JsonObject, StoreError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Internal("stored body is not a JSON object")),
    }
}

/// Stored bodies carry no `_id`/`_rev`; reads put them back.
pub(in crate::store) fn assemble_doc(
    id: &str,
    rev: &str,
    body: JsonObject,
    deleted: bool,
) -> JsonObject {
    let mut doc = JsonObject::with_capacity(body.len() + 3);
    doc.insert("_id".to_string(), Value::String(id.to_string()));
    doc.insert("_rev".to_string(), Value::String(rev.to_string()));
    if deleted {
        doc.insert("_deleted".to_string(), Value::Bool(true));
    }
    doc.extend(body);
    doc
}

pub(in crate::store) fn attachment_stubs(body: &JsonObject) -> Option<&JsonObject> {
    body.get("_attachments").and_then(Value::as_object)
}
