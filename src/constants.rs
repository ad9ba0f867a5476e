use std::time::Duration;

// -
// Runtime client

/// Deadline applied to connect and to every CRI call
pub(crate) const CRI_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Scheme prefix accepted on `cri_socket_path`
pub(crate) const UNIX_SCHEME_PREFIX: &str = "unix://";

/// Placeholder authority for the gRPC endpoint; the connector ignores it
pub(crate) const CRI_ENDPOINT_PLACEHOLDER: &str = "http://[::]:50051";

// -
// Manifest watching

/// Capacity of the manifest event queue handed to the engine
pub(crate) const MANIFEST_EVENT_QUEUE_CAPACITY: usize = 100;

/// Capacity of the raw notification queue between the OS backend and the watcher task
pub(crate) const RAW_NOTIFY_QUEUE_CAPACITY: usize = 100;

pub(crate) const MANIFEST_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

// -
// Manifest kinds: (group, version, kind)

pub(crate) const WORKLOAD_GVK: (&str, &str, &str) = ("apps", "v1", "Deployment");
pub(crate) const CONFIG_DATA_GVK: (&str, &str, &str) = ("", "v1", "ConfigMap");
pub(crate) const SECRET_DATA_GVK: (&str, &str, &str) = ("", "v1", "Secret");

pub(crate) const DEFAULT_NAMESPACE: &str = "default";

// -
// Sandboxes started by the engine

pub const MANAGED_BY_LABEL: &str = "kubeless.io/managed";
pub(crate) const POD_LOG_ROOT: &str = "/var/log/pods";

// -
// Config

pub(crate) const ENV_PREFIX: &str = "KUBELESS";
pub const LOG_FILE_NAME: &str = "kubeless.log";
