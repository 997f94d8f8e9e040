//! Small utilities shared by all of the `tg` crates.

pub mod assert;
pub mod env;
