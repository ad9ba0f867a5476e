//! Error hierarchy for the kubeless node agent.
//!
//! Each component returns its own error type; the binary lifts them into
//! [`Error`] and decides what is fatal.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or merged
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration loaded but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Manifest decoding or reading failures
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Filesystem watch setup or backend failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Container runtime control plane failures
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The status server could not bind its address
    #[error("status server failed: {0}")]
    StatusServer(#[from] warp::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The document stream could not be tokenized into documents
    #[error("failed to decode manifest stream: {0}")]
    Decode(#[from] serde_yaml::Error),

    /// Manifest bytes are not valid UTF-8
    #[error("manifest is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A configured directory exists but could not be watched
    #[error("failed to watch directory {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The OS notification backend could not be created
    #[error("failed to create filesystem watcher: {0}")]
    Backend(#[source] notify::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// An RPC was attempted before a successful connect
    #[error("CRI runtime client not initialized, call connect() first")]
    NotInitialized,

    /// Dialing the runtime socket failed
    #[error("failed to connect to CRI socket {address}: {reason}")]
    Connection { address: String, reason: String },

    /// The runtime answered with a non-OK status
    #[error("CRI call {method} failed: {status}")]
    Call {
        method: &'static str,
        #[source]
        status: Box<tonic::Status>,
    },

    /// The call exceeded its deadline
    #[error("CRI call {method} timed out after {duration:?}")]
    Timeout {
        method: &'static str,
        duration: Duration,
    },

    /// The caller's cancellation token fired before the call completed
    #[error("CRI call {method} cancelled")]
    Cancelled { method: &'static str },
}

impl RuntimeError {
    pub(crate) fn call(
        method: &'static str,
        status: tonic::Status,
    ) -> Self {
        RuntimeError::Call {
            method,
            status: Box::new(status),
        }
    }
}
