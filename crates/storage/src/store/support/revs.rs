#![forbid(unsafe_code)]

use super::super::StoreError;
use super::json::JsonObject;
use dk_core::Revision;
use sha2::{Digest, Sha256};
use std::fmt::Write;

pub(in crate::store) fn parse_rev(value: &str) -> Result<Revision, StoreError> {
    Revision::parse(value).map_err(|err| StoreError::InvalidInput(err.message()))
}

/// Random by default; with `deterministic` the same parent, flag and body
/// always yield the same hash.
pub(in crate::store) fn new_rev_hash(
    deterministic: bool,
    parent: Option<&Revision>,
    deleted: bool,
    body: &JsonObject,
    attachments: Option<&JsonObject>,
) -> Result<String, StoreError> {
    if !deterministic {
        return Ok(uuid::Uuid::new_v4().simple().to_string());
    }

    let mut hasher = Sha256::new();
    if let Some(parent) = parent {
        hasher.update(parent.to_string().as_bytes());
    }
    hasher.update([b'\n', u8::from(deleted), b'\n']);
    hasher.update(serde_json::to_vec(body)?);
    if let Some(attachments) = attachments {
        hasher.update(serde_json::to_vec(attachments)?);
    }
    let digest = hasher.finalize();

    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

pub(in crate::store) fn parse_local_rev(value: &str) -> Result<u64, StoreError> {
    value
        .strip_prefix("0-")
        .and_then(|counter| counter.parse::<u64>().ok())
        .ok_or(StoreError::InvalidInput("local revision must look like 0-<n>"))
}

pub(in crate::store) fn format_local_rev(counter: u64) -> String {
    format!("0-{counter}")
}
