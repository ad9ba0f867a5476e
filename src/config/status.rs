use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_status_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: default_status_enabled(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl StatusConfig {
    /// Returns `Error::InvalidConfig` when the server is enabled with an
    /// address that does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            self.socket_addr()?;
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            Error::InvalidConfig(format!(
                "status.listen_addr {:?} is not a socket address: {}",
                self.listen_addr, e
            ))
        })
    }
}

fn default_status_enabled() -> bool {
    true
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}
