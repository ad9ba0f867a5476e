//! Client side of the local container runtime control plane (CRI).

mod client;
mod types;

pub use client::*;
pub use types::*;

/// Generated bindings for the `runtime.v1` CRI subset.
pub mod cri {
    tonic::include_proto!("runtime.v1");
}
