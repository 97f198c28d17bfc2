#![forbid(unsafe_code)]

mod changes;
mod docs;
mod info;

pub use changes::*;
pub use docs::*;
pub use info::*;
