#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: String,
    pub instance_id: String,
    pub doc_count: u64,
    pub update_seq: i64,
    pub schema_version: i64,
}
