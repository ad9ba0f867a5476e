//! Pure planning of the runtime operations that move observed state towards
//! desired state.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::constants::MANAGED_BY_LABEL;
use crate::runtime::RuntimeSandbox;
use crate::runtime::SandboxState;
use crate::store::WorkloadKey;
use crate::store::WorkloadStatus;

/// One sandbox to stop, optionally followed by removal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StopAction {
    pub key: WorkloadKey,
    pub sandbox_id: String,
    /// Orphans are removed; scaled-to-zero sandboxes are only stopped
    pub remove: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergencePlan {
    pub start: Vec<WorkloadKey>,
    pub stop: Vec<StopAction>,
}

impl ConvergencePlan {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty()
    }
}

/// Status a workload takes when `state` is the best sandbox observed for it.
pub fn status_for(
    state: SandboxState,
    replicas: u32,
) -> WorkloadStatus {
    match state {
        SandboxState::Ready => WorkloadStatus::Running,
        SandboxState::NotReady if replicas == 0 => WorkloadStatus::Stopped,
        SandboxState::NotReady => WorkloadStatus::Pending,
        SandboxState::Other(_) => WorkloadStatus::Unknown,
    }
}

/// Keeps the highest-ranked sandbox per key (Ready > NotReady > Other).
pub fn best_sandboxes(observed: &[RuntimeSandbox]) -> HashMap<WorkloadKey, &RuntimeSandbox> {
    let mut best: HashMap<WorkloadKey, &RuntimeSandbox> = HashMap::new();
    for sandbox in observed {
        let key = WorkloadKey::new(sandbox.namespace.clone(), sandbox.name.clone());
        match best.get(&key) {
            Some(current) if current.state.rank() >= sandbox.state.rank() => {}
            _ => {
                best.insert(key, sandbox);
            }
        }
    }
    best
}

pub(crate) fn is_managed(sandbox: &RuntimeSandbox) -> bool {
    sandbox
        .labels
        .get(MANAGED_BY_LABEL)
        .is_some_and(|v| v == "true")
}

/// Computes what to start and stop.
///
/// `desired` maps every workload with a live manifest to its replica count.
/// For a workload with replicas ≥ 1:
/// - a Ready sandbox keeps it running and nothing is started;
/// - otherwise its managed NotReady sandboxes are stopped and removed and a
///   fresh sandbox is started, which restarts crashed or scaled-up workloads;
/// - an unmanaged NotReady sandbox is left alone and suppresses the start.
///
/// Ready sandboxes of a workload scaled to zero are stopped and kept. When
/// `garbage_collect` is set, managed sandboxes whose key is not desired are
/// stopped and removed. Output is sorted by key.
pub fn plan(
    desired: &BTreeMap<WorkloadKey, u32>,
    observed: &[RuntimeSandbox],
    garbage_collect: bool,
) -> ConvergencePlan {
    let ready: HashSet<WorkloadKey> = observed
        .iter()
        .filter(|sandbox| sandbox.state == SandboxState::Ready)
        .map(|sandbox| WorkloadKey::new(sandbox.namespace.clone(), sandbox.name.clone()))
        .collect();
    let mut live = ready.clone();
    let mut stop = Vec::new();

    for sandbox in observed {
        let key = WorkloadKey::new(sandbox.namespace.clone(), sandbox.name.clone());
        match desired.get(&key) {
            Some(0) => {
                if sandbox.state == SandboxState::Ready {
                    stop.push(StopAction {
                        key,
                        sandbox_id: sandbox.id.clone(),
                        remove: false,
                    });
                }
            }
            Some(_) => {
                if sandbox.state != SandboxState::NotReady || ready.contains(&key) {
                    continue;
                }
                if is_managed(sandbox) {
                    stop.push(StopAction {
                        key,
                        sandbox_id: sandbox.id.clone(),
                        remove: true,
                    });
                } else {
                    live.insert(key);
                }
            }
            None if garbage_collect && is_managed(sandbox) => stop.push(StopAction {
                key,
                sandbox_id: sandbox.id.clone(),
                remove: true,
            }),
            None => {}
        }
    }

    let start = desired
        .iter()
        .filter(|(key, replicas)| **replicas >= 1 && !live.contains(*key))
        .map(|(key, _)| key.clone())
        .collect();

    stop.sort();
    ConvergencePlan { start, stop }
}
