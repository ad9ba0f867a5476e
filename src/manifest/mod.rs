//! Manifest discovery and decoding.

mod parser;
mod types;
mod watcher;

pub use parser::*;
pub use types::*;
pub use watcher::*;

#[cfg(test)]
mod parser_test;
