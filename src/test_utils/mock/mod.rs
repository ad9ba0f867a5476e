//! Canned-response CRI runtime served over a Unix socket.
//!
//! Each RPC answers with whatever the test configured on
//! [`MockRuntimeService`], so client tests exercise the real transport
//! without a container runtime on the host.

mod mock_rpc;
mod mock_rpc_service;

pub use mock_rpc::*;
pub use mock_rpc_service::*;
