use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Switches for the convergence half of the engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    /// Start and stop sandboxes; when false the agent only observes
    #[serde(default = "default_converge")]
    pub converge: bool,

    /// Stop and remove sandboxes that no manifest asks for
    #[serde(default = "default_garbage_collect")]
    pub garbage_collect: bool,

    /// CRI runtime handler for new sandboxes; empty selects the runtime default
    #[serde(default)]
    pub runtime_handler: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            converge: default_converge(),
            garbage_collect: default_garbage_collect(),
            runtime_handler: String::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runtime_handler.chars().any(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "reconcile.runtime_handler {:?} must not contain whitespace",
                self.runtime_handler
            )));
        }
        Ok(())
    }
}

fn default_converge() -> bool {
    true
}

fn default_garbage_collect() -> bool {
    true
}
