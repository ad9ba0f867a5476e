//! In-memory cache of desired and observed workload state.
//!
//! An entry exists only after a manifest has been applied for its key;
//! runtime observations for unknown keys are dropped. Readers always get
//! owned copies.

use std::collections::HashMap;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::manifest::Workload;

/// `(namespace, name)` identity of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl From<&Workload> for WorkloadKey {
    fn from(workload: &Workload) -> Self {
        Self::new(workload.namespace.clone(), workload.name.clone())
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkloadStatus {
    Unknown,
    Pending,
    Running,
    Stopped,
}

impl fmt::Display for WorkloadStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            WorkloadStatus::Unknown => "Unknown",
            WorkloadStatus::Pending => "Pending",
            WorkloadStatus::Running => "Running",
            WorkloadStatus::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadState {
    pub name: String,
    pub namespace: String,
    #[serde(skip)]
    pub manifest: Workload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_sandbox_id: Option<String>,
    pub status: WorkloadStatus,
    pub last_updated: DateTime<Utc>,
}

impl WorkloadState {
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(self.namespace.clone(), self.name.clone())
    }

    fn touch(&mut self) {
        // Never move backwards, even if the wall clock does.
        self.last_updated = Utc::now().max(self.last_updated);
    }
}

#[derive(Debug, Default)]
pub struct WorkloadStore {
    workloads: RwLock<HashMap<WorkloadKey, WorkloadState>>,
}

impl WorkloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `manifest` as the desired state of `namespace/name`.
    ///
    /// A new entry starts out `Pending`; an existing entry keeps its observed
    /// status and sandbox id.
    pub fn update_workload(
        &self,
        namespace: &str,
        name: &str,
        manifest: Workload,
    ) {
        let key = WorkloadKey::new(namespace, name);
        let mut workloads = self.workloads.write();
        match workloads.get_mut(&key) {
            Some(state) => {
                state.manifest = manifest;
                state.touch();
                trace!("updated manifest of {} (status {})", key, state.status);
            }
            None => {
                debug!("tracking new workload {}", key);
                workloads.insert(
                    key,
                    WorkloadState {
                        name: name.to_string(),
                        namespace: namespace.to_string(),
                        manifest,
                        pod_sandbox_id: None,
                        status: WorkloadStatus::Pending,
                        last_updated: Utc::now(),
                    },
                );
            }
        }
    }

    /// Folds a runtime observation into an existing entry.
    ///
    /// Returns `false` without creating anything when the key is unknown.
    pub fn update_pod_status(
        &self,
        namespace: &str,
        name: &str,
        sandbox_id: &str,
        status: WorkloadStatus,
    ) -> bool {
        let key = WorkloadKey::new(namespace, name);
        let mut workloads = self.workloads.write();
        let Some(state) = workloads.get_mut(&key) else {
            trace!("ignoring status for untracked workload {}", key);
            return false;
        };

        if state.status != status {
            debug!("{} status {} -> {}", key, state.status, status);
        }
        state.pod_sandbox_id = Some(sandbox_id.to_string());
        state.status = status;
        state.touch();
        true
    }

    pub fn get_workloads(&self) -> Vec<WorkloadState> {
        self.workloads.read().values().cloned().collect()
    }

    pub fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<WorkloadState> {
        self.workloads
            .read()
            .get(&WorkloadKey::new(namespace, name))
            .cloned()
    }

    pub fn delete_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> bool {
        let key = WorkloadKey::new(namespace, name);
        let removed = self.workloads.write().remove(&key).is_some();
        if removed {
            debug!("stopped tracking workload {}", key);
        }
        removed
    }

    pub fn keys(&self) -> Vec<WorkloadKey> {
        self.workloads.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workloads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.read().is_empty()
    }
}
