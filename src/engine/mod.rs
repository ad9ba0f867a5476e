//! Reconciliation between manifests on disk and sandboxes on the runtime.

mod convergence;
mod reconciler;

pub use convergence::*;
pub use reconciler::*;
