#![forbid(unsafe_code)]

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub id: String,
    pub seq: i64,
    /// Leaf revisions reported for this change; the winner comes first.
    pub changes: Vec<String>,
    pub deleted: bool,
    pub doc: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangesResult {
    pub results: Vec<Change>,
    pub last_seq: i64,
    /// Set when a filter ended the feed.
    pub stopped: bool,
}
