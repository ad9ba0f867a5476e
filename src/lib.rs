//! A minimal node agent that keeps containerized workloads declared in
//! manifest files converged with a local CRI container runtime.
//!
//! The pieces, leaf first:
//! - [`manifest`]: decoding manifest files and watching their directories
//! - [`store`]: the shared desired/observed workload cache
//! - [`runtime`]: the CRI client
//! - [`engine`]: reconciliation between all of the above
//! - [`api`]: the read-only status endpoint

pub mod api;
pub mod config;
pub mod constants;
pub mod engine;
mod errors;
pub mod manifest;
pub mod metrics;
pub mod runtime;
pub mod store;
pub mod utils;

pub use errors::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
