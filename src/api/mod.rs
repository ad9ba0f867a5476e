//! Read-only HTTP surface: workload status and Prometheus metrics.

mod status;

pub use status::*;
