//! Decodes multi-document YAML/JSON buffers into [`WorkloadManifest`]s.
//!
//! The whole stream is tokenized before any document is classified, so a
//! malformed stream yields a single [`ManifestError::Decode`] and no partial
//! results. Individual documents that are well-formed but unusable are
//! skipped with a log line.

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ConfigData;
use super::ContainerSpec;
use super::PodTemplate;
use super::SecretData;
use super::Workload;
use super::WorkloadManifest;
use crate::constants::CONFIG_DATA_GVK;
use crate::constants::DEFAULT_NAMESPACE;
use crate::constants::SECRET_DATA_GVK;
use crate::constants::WORKLOAD_GVK;
use crate::ManifestError;

/// (group, version, kind) of a decoded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    /// `apiVersion` is either `group/version` or a bare `version` of the core group.
    pub fn from_api_version(
        api_version: &str,
        kind: &str,
    ) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    fn is(
        &self,
        gvk: (&str, &str, &str),
    ) -> bool {
        self.group == gvk.0 && self.version == gvk.1 && self.kind == gvk.2
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses every document in `data`, preserving source order among the
    /// recognized ones.
    pub fn parse(
        &self,
        data: &[u8],
    ) -> Result<Vec<WorkloadManifest>, ManifestError> {
        let text = std::str::from_utf8(data)?;

        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            documents.push(Value::deserialize(document)?);
        }

        Ok(documents
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| self.decode_document(index, value))
            .collect())
    }

    pub fn parse_file(
        &self,
        path: &Path,
    ) -> Result<Vec<WorkloadManifest>, ManifestError> {
        let data = std::fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&data)
    }

    fn decode_document(
        &self,
        index: usize,
        value: Value,
    ) -> Option<WorkloadManifest> {
        if value.is_null() {
            debug!("document #{} is empty, skipping", index);
            return None;
        }

        let Some(gvk) = Self::identify(&value) else {
            warn!(
                "document #{} has no apiVersion/kind, skipping",
                index
            );
            return None;
        };

        let decoded = if gvk.is(WORKLOAD_GVK) {
            decode_typed::<DeploymentDocument>(value).and_then(DeploymentDocument::into_manifest)
        } else if gvk.is(CONFIG_DATA_GVK) {
            decode_typed::<ConfigMapDocument>(value).and_then(ConfigMapDocument::into_manifest)
        } else if gvk.is(SECRET_DATA_GVK) {
            decode_typed::<SecretDocument>(value).and_then(SecretDocument::into_manifest)
        } else {
            info!(
                "Skipping unsupported GVK: {}/{}/{}",
                gvk.group, gvk.version, gvk.kind
            );
            return None;
        };

        match decoded {
            Ok(manifest) => Some(manifest),
            Err(reason) => {
                warn!(
                    "document #{} ({}) could not be decoded, skipping: {}",
                    index, gvk.kind, reason
                );
                None
            }
        }
    }

    fn identify(value: &Value) -> Option<GroupVersionKind> {
        let api_version = value.get("apiVersion")?.as_str()?;
        let kind = value.get("kind")?.as_str()?;
        if api_version.is_empty() || kind.is_empty() {
            return None;
        }
        Some(GroupVersionKind::from_api_version(api_version, kind))
    }
}

fn decode_typed<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_yaml::from_value(value).map_err(|e| e.to_string())
}

fn namespace_or_default(namespace: String) -> String {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        namespace
    }
}

fn require_name(meta: &ObjectMeta) -> Result<(), String> {
    if meta.name.is_empty() {
        return Err("metadata.name is required".to_string());
    }
    Ok(())
}

//-----------------------------------------------------------
// Wire shapes of the supported kinds

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentDocument {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: DeploymentSpec,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSpec {
    replicas: Option<u32>,
    #[serde(default)]
    template: PodTemplateSpec,
}

#[derive(Debug, Default, Deserialize)]
struct PodTemplateSpec {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: PodSpec,
}

#[derive(Debug, Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<ContainerSpec>,
}

impl DeploymentDocument {
    fn into_manifest(self) -> Result<WorkloadManifest, String> {
        require_name(&self.metadata)?;
        Ok(WorkloadManifest::Workload(Workload {
            name: self.metadata.name,
            namespace: namespace_or_default(self.metadata.namespace),
            // Kubernetes defaults an omitted replica count to one
            replicas: self.spec.replicas.unwrap_or(1),
            labels: self.metadata.labels,
            template: PodTemplate {
                labels: self.spec.template.metadata.labels,
                containers: self.spec.template.spec.containers,
            },
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ConfigMapDocument {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl ConfigMapDocument {
    fn into_manifest(self) -> Result<WorkloadManifest, String> {
        require_name(&self.metadata)?;
        Ok(WorkloadManifest::ConfigData(ConfigData {
            name: self.metadata.name,
            namespace: namespace_or_default(self.metadata.namespace),
            data: self.data,
        }))
    }
}

#[derive(Deserialize)]
struct SecretDocument {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default, rename = "stringData")]
    string_data: BTreeMap<String, String>,
}

impl SecretDocument {
    fn into_manifest(self) -> Result<WorkloadManifest, String> {
        require_name(&self.metadata)?;

        let mut data = BTreeMap::new();
        for (key, encoded) in self.data {
            let compact: String = encoded.split_whitespace().collect();
            let bytes = STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| format!("data[{}] is not valid base64: {}", key, e))?;
            data.insert(key, bytes);
        }
        // stringData wins on conflicting keys
        for (key, plain) in self.string_data {
            data.insert(key, plain.into_bytes());
        }

        Ok(WorkloadManifest::SecretData(SecretData {
            name: self.metadata.name,
            namespace: namespace_or_default(self.metadata.namespace),
            data,
        }))
    }
}
