#![forbid(unsafe_code)]

use super::Change;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct BulkDocsRequest {
    pub docs: Vec<serde_json::Value>,
    /// `false` stores the supplied `_rev` verbatim, as replication does.
    pub new_edits: bool,
}

impl BulkDocsRequest {
    pub fn new(docs: Vec<serde_json::Value>) -> Self {
        Self {
            docs,
            new_edits: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub rev: Option<String>,
    pub revs: bool,
    pub conflicts: bool,
    pub attachments: bool,
    pub latest: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllDocsOptions {
    pub start_key: Option<String>,
    pub end_key: Option<String>,
    pub inclusive_end: bool,
    pub keys: Option<Vec<String>>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub descending: bool,
    pub include_docs: bool,
    pub attachments: bool,
    pub conflicts: bool,
}

impl Default for AllDocsOptions {
    fn default() -> Self {
        Self {
            start_key: None,
            end_key: None,
            inclusive_end: true,
            keys: None,
            skip: 0,
            limit: None,
            descending: false,
            include_docs: false,
            attachments: false,
            conflicts: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterDecision {
    Include,
    Skip,
    /// Ends the whole feed; the change that produced it is not delivered.
    Stop,
}

pub type ChangeFilter = Arc<dyn Fn(&Change) -> FilterDecision + Send + Sync>;

#[derive(Clone, Default)]
pub struct ChangesOptions {
    pub since: i64,
    pub limit: Option<usize>,
    pub descending: bool,
    pub doc_ids: Option<BTreeSet<String>>,
    pub include_docs: bool,
    pub attachments: bool,
    pub conflicts: bool,
    pub filter: Option<ChangeFilter>,
}

impl fmt::Debug for ChangesOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangesOptions")
            .field("since", &self.since)
            .field("limit", &self.limit)
            .field("descending", &self.descending)
            .field("doc_ids", &self.doc_ids)
            .field("include_docs", &self.include_docs)
            .field("attachments", &self.attachments)
            .field("conflicts", &self.conflicts)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
