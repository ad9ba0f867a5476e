use std::collections::HashMap;
use std::fmt;

use super::cri;

/// Sandbox state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxState {
    Ready,
    NotReady,
    /// Value this agent does not know, kept verbatim
    Other(i32),
}

impl SandboxState {
    /// Ordering used to pick one sandbox when several share a key.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            SandboxState::Ready => 2,
            SandboxState::NotReady => 1,
            SandboxState::Other(_) => 0,
        }
    }
}

impl From<i32> for SandboxState {
    fn from(raw: i32) -> Self {
        match cri::PodSandboxState::try_from(raw) {
            Ok(cri::PodSandboxState::SandboxReady) => SandboxState::Ready,
            Ok(cri::PodSandboxState::SandboxNotready) => SandboxState::NotReady,
            Err(_) => SandboxState::Other(raw),
        }
    }
}

impl fmt::Display for SandboxState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SandboxState::Ready => f.write_str("Ready"),
            SandboxState::NotReady => f.write_str("NotReady"),
            SandboxState::Other(raw) => write!(f, "Other({})", raw),
        }
    }
}

/// One sandbox observed on the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSandbox {
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub state: SandboxState,
    pub labels: HashMap<String, String>,
}

impl From<cri::PodSandbox> for RuntimeSandbox {
    fn from(sandbox: cri::PodSandbox) -> Self {
        // Sandboxes without metadata match no workload.
        let (namespace, name) = sandbox
            .metadata
            .map(|meta| (meta.namespace, meta.name))
            .unwrap_or_default();
        Self {
            id: sandbox.id,
            namespace,
            name,
            state: SandboxState::from(sandbox.state),
            labels: sandbox.labels,
        }
    }
}

/// Everything needed to ask the runtime for a new sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SandboxSpec {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub hostname: String,
    pub log_directory: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub runtime_handler: String,
}

impl SandboxSpec {
    pub(crate) fn into_request(self) -> cri::RunPodSandboxRequest {
        cri::RunPodSandboxRequest {
            config: Some(cri::PodSandboxConfig {
                metadata: Some(cri::PodSandboxMetadata {
                    name: self.name,
                    uid: self.uid,
                    namespace: self.namespace,
                    attempt: 0,
                }),
                hostname: self.hostname,
                log_directory: self.log_directory,
                labels: self.labels,
                annotations: self.annotations,
            }),
            runtime_handler: self.runtime_handler,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub version: String,
    pub runtime_name: String,
    pub runtime_version: String,
    pub runtime_api_version: String,
}

impl From<cri::VersionResponse> for RuntimeVersion {
    fn from(resp: cri::VersionResponse) -> Self {
        Self {
            version: resp.version,
            runtime_name: resp.runtime_name,
            runtime_version: resp.runtime_version,
            runtime_api_version: resp.runtime_api_version,
        }
    }
}
