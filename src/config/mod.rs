//! Agent configuration.
//!
//! Sources, lowest priority first:
//! 1. Hardcoded defaults
//! 2. The file named by `CONFIG_PATH` (or `--config`), YAML or TOML
//! 3. `KUBELESS__*` environment variables (`__` nests, lists are comma separated)
//!
//! Loading never validates; call [`AgentConfig::validate`] explicitly.

mod reconcile;
mod status;

pub use reconcile::*;
pub use status::*;


use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_PREFIX;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentConfig {
    /// Directories scanned and watched for manifests
    #[serde(default)]
    pub manifest_dirs: Vec<PathBuf>,

    /// CRI socket, optionally prefixed with `unix://`
    #[serde(default)]
    pub cri_socket_path: String,

    /// Period of runtime synchronization, e.g. `"10s"` or `"500ms"`
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,

    /// Write logs to `<log_dir>/kubeless.log` instead of stdout
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            manifest_dirs: Vec::new(),
            cri_socket_path: String::new(),
            sync_interval: default_sync_interval(),
            log_dir: None,
            status: StatusConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers the file at `path` over `self`; environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path).required(true))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        if self.manifest_dirs.is_empty() {
            return Err(Error::InvalidConfig(
                "manifest_dirs must name at least one directory".into(),
            ));
        }
        if let Some(empty) = self.manifest_dirs.iter().find(|d| d.as_os_str().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "manifest_dirs contains an empty path: {:?}",
                empty
            )));
        }
        if self.cri_socket_path.trim().is_empty() {
            return Err(Error::InvalidConfig("cri_socket_path is required".into()));
        }
        self.sync_interval()?;
        self.status.validate()?;
        self.reconcile.validate()?;
        Ok(self)
    }

    pub fn sync_interval(&self) -> Result<Duration> {
        parse_duration(&self.sync_interval).and_then(|d| {
            if d.is_zero() {
                Err(Error::InvalidConfig("sync_interval must be greater than zero".into()))
            } else {
                Ok(d)
            }
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("manifest_dirs")
}

fn default_sync_interval() -> String {
    "10s".to_string()
}

/// Parses `<integer><unit>` with unit one of `ms`, `s`, `m`, `h`.
pub(crate) fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid duration {:?}", value)))?;

    let duration = match unit {
        "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "invalid duration unit in {:?}, expected ms, s, m or h",
                value
            )))
        }
    };
    Ok(duration)
}
