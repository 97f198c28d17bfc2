#![forbid(unsafe_code)]

use super::super::StoreError;
use dk_core::Revision;
use serde_json::Value;

/// Outcome of one input document of a bulk write, in input order.
#[derive(Debug)]
pub struct DocWriteResult {
    pub id: Option<String>,
    pub result: Result<String, StoreError>,
}

impl DocWriteResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn rev(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.result.as_ref().err()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllDocsValue {
    pub rev: String,
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllDocsRow {
    pub key: String,
    pub id: Option<String>,
    pub value: Option<AllDocsValue>,
    pub doc: Option<Value>,
    pub error: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllDocsResponse {
    pub total_rows: u64,
    pub offset: usize,
    pub rows: Vec<AllDocsRow>,
}

/// Metadata row of a non-local document, decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct DocMetadata {
    pub id: String,
    pub rev: Revision,
    pub rev_tree: dk_core::RevTree,
    pub winning_seq: i64,
    pub max_seq: i64,
    pub deleted: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub revisions_removed: usize,
    pub attachments_removed: usize,
}

impl CompactStats {
    pub(in crate::store) fn absorb(&mut self, other: CompactStats) {
        self.revisions_removed += other.revisions_removed;
        self.attachments_removed += other.attachments_removed;
    }
}
