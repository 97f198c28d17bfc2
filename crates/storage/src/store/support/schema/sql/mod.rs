#![forbid(unsafe_code)]

mod indexes;
mod tables;

pub(super) use indexes::{ATTACH_SEQ_INDEXES, BY_SEQ_DELETED_INDEX};
pub(super) use tables::ATTACH_SEQ_TABLE;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(tables::SQL);
    sql.push_str(tables::ATTACH_SEQ_TABLE);
    sql.push_str(indexes::SQL);
    sql.push_str(indexes::BY_SEQ_DELETED_INDEX);
    sql.push_str(indexes::ATTACH_SEQ_INDEXES);
    sql
}
