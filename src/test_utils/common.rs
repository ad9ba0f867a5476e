use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use crate::manifest::ContainerSpec;
use crate::manifest::PodTemplate;
use crate::manifest::Workload;
use crate::runtime::RuntimeSandbox;
use crate::runtime::SandboxState;

pub(crate) fn workload(
    namespace: &str,
    name: &str,
    replicas: u32,
) -> Workload {
    let labels = BTreeMap::from([("app".to_string(), name.to_string())]);
    Workload {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas,
        labels: labels.clone(),
        template: PodTemplate {
            labels,
            containers: vec![ContainerSpec {
                name: name.to_string(),
                image: format!("{}:latest", name),
                ..Default::default()
            }],
        },
    }
}

pub(crate) fn sandbox(
    id: &str,
    namespace: &str,
    name: &str,
    state: SandboxState,
) -> RuntimeSandbox {
    RuntimeSandbox {
        id: id.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        state,
        labels: Default::default(),
    }
}

/// Renders a Deployment document for `namespace/name`.
pub(crate) fn deployment_yaml(
    namespace: &str,
    name: &str,
    replicas: u32,
) -> String {
    format!(
        "apiVersion: apps/v1\n\
         kind: Deployment\n\
         metadata:\n  name: {name}\n  namespace: {namespace}\n\
         spec:\n  replicas: {replicas}\n  template:\n    metadata:\n      labels:\n        app: {name}\n    spec:\n      containers:\n        - name: {name}\n          image: {name}:latest\n"
    )
}

pub(crate) fn write_manifest(
    dir: &Path,
    file_name: &str,
    contents: &str,
) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}
