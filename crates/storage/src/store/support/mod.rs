#![forbid(unsafe_code)]

mod attachments_tx;
mod changes_tx;
mod compact_tx;
mod docs_tx;
mod json;
mod revs;
mod schema;
mod write_tx;

pub(super) use attachments_tx::*;
pub(super) use changes_tx::*;
pub(super) use compact_tx::*;
pub(super) use docs_tx::*;
pub(super) use json::*;
pub(super) use revs::*;
pub(super) use schema::{SCHEMA_VERSION, configure_connection, open_or_create, read_current};
pub(super) use write_tx::*;
