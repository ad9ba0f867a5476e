use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Closed set of descriptors the parser recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadManifest {
    Workload(Workload),
    ConfigData(ConfigData),
    SecretData(SecretData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Workload,
    ConfigData,
    SecretData,
}

impl WorkloadManifest {
    pub fn kind(&self) -> ManifestKind {
        match self {
            WorkloadManifest::Workload(_) => ManifestKind::Workload,
            WorkloadManifest::ConfigData(_) => ManifestKind::ConfigData,
            WorkloadManifest::SecretData(_) => ManifestKind::SecretData,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            WorkloadManifest::Workload(w) => &w.namespace,
            WorkloadManifest::ConfigData(c) => &c.namespace,
            WorkloadManifest::SecretData(s) => &s.namespace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WorkloadManifest::Workload(w) => &w.name,
            WorkloadManifest::ConfigData(c) => &c.name,
            WorkloadManifest::SecretData(s) => &s.name,
        }
    }

    pub fn into_workload(self) -> Option<Workload> {
        match self {
            WorkloadManifest::Workload(w) => Some(w),
            WorkloadManifest::ConfigData(_) | WorkloadManifest::SecretData(_) => None,
        }
    }
}

/// Desired state of one containerized workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub labels: BTreeMap<String, String>,
    pub template: PodTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigData {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecretData {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

// Values are never logged.
impl fmt::Debug for SecretData {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SecretData")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestEventType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ManifestEventType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            ManifestEventType::Added => "ADDED",
            ManifestEventType::Modified => "MODIFIED",
            ManifestEventType::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// A semantic change to one manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEvent {
    pub event_type: ManifestEventType,
    pub file_path: PathBuf,
}

impl ManifestEvent {
    pub fn new(
        event_type: ManifestEventType,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            event_type,
            file_path: file_path.into(),
        }
    }
}
