mod workload_store;

pub use workload_store::*;
