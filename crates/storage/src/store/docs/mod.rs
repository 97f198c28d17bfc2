#![forbid(unsafe_code)]

mod all_docs;
mod attachments;
mod get;
mod rev_tree;
