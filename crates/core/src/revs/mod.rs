#![forbid(unsafe_code)]

mod revision;
mod tree;

pub use revision::*;
pub use tree::*;
