use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::best_sandboxes;
use super::plan;
use super::status_for;
use super::StopAction;
use crate::config::AgentConfig;
use crate::constants::MANAGED_BY_LABEL;
use crate::constants::POD_LOG_ROOT;
use crate::manifest::is_manifest_path;
use crate::manifest::ManifestEvent;
use crate::manifest::ManifestEventType;
use crate::manifest::ManifestParser;
use crate::manifest::Workload;
use crate::manifest::WorkloadManifest;
use crate::metrics::record_sandbox_operation;
use crate::metrics::MANIFEST_EVENTS;
use crate::metrics::MANIFEST_PARSE_FAILURES;
use crate::metrics::RUNTIME_SYNC_FAILURES;
use crate::metrics::WORKLOADS_TRACKED;
use crate::runtime::RuntimeClient;
use crate::runtime::RuntimeSandbox;
use crate::runtime::SandboxSpec;
use crate::store::WorkloadKey;
use crate::store::WorkloadStore;
use crate::ManifestError;
use crate::Result;
use crate::RuntimeError;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sync_interval: Duration,
    pub converge: bool,
    pub garbage_collect: bool,
    pub runtime_handler: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(10),
            converge: true,
            garbage_collect: true,
            runtime_handler: String::new(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Ok(Self {
            sync_interval: config.sync_interval()?,
            converge: config.reconcile.converge,
            garbage_collect: config.reconcile.garbage_collect,
            runtime_handler: config.reconcile.runtime_handler.clone(),
        })
    }
}

/// Drives the store and the runtime towards the manifests on disk.
///
/// The file index and the runtime client are owned by the single task that
/// calls [`ReconciliationEngine::run`]; only the store is shared.
pub struct ReconciliationEngine<C>
where
    C: RuntimeClient,
{
    store: Arc<WorkloadStore>,
    client: Arc<C>,
    parser: ManifestParser,
    /// Workload keys each manifest file contributed on its last good parse
    file_index: HashMap<PathBuf, BTreeSet<WorkloadKey>>,
    settings: EngineSettings,
}

impl<C> ReconciliationEngine<C>
where
    C: RuntimeClient,
{
    pub fn new(
        store: Arc<WorkloadStore>,
        client: Arc<C>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            client,
            parser: ManifestParser::new(),
            file_index: HashMap::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<WorkloadStore> {
        &self.store
    }

    /// Keys currently attributed to `path`.
    pub fn indexed_keys(
        &self,
        path: &Path,
    ) -> Option<&BTreeSet<WorkloadKey>> {
        self.file_index.get(path)
    }

    pub fn handle_event(
        &mut self,
        event: &ManifestEvent,
    ) {
        debug!(
            "handling manifest event: type={}, file={}",
            event.event_type,
            event.file_path.display()
        );
        MANIFEST_EVENTS
            .with_label_values(&[&event.event_type.to_string()])
            .inc();

        match event.event_type {
            ManifestEventType::Added | ManifestEventType::Modified => {
                if let Err(e) = self.apply_manifest_file(&event.file_path) {
                    MANIFEST_PARSE_FAILURES.inc();
                    warn!(
                        "Failed to apply manifest {}, keeping previous state: {}",
                        event.file_path.display(),
                        e
                    );
                }
            }
            ManifestEventType::Deleted => {
                self.remove_manifest_file(&event.file_path);
            }
        }
        WORKLOADS_TRACKED.set(self.store.len() as i64);
    }

    /// Parses `path` and makes its workloads the file's contribution to the
    /// store. Returns the number of workloads applied.
    ///
    /// On error neither the store nor the index is touched. An empty file is
    /// treated as a write in progress and also leaves both untouched; delete
    /// the file to retract its workloads.
    pub fn apply_manifest_file(
        &mut self,
        path: &Path,
    ) -> std::result::Result<usize, ManifestError> {
        let data = std::fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // An in-place rewrite truncates before writing; wait for the content.
        if data.iter().all(u8::is_ascii_whitespace) {
            debug!("{} is empty, keeping its previous workloads", path.display());
            return Ok(0);
        }
        let manifests = self.parser.parse(&data)?;

        let workloads: Vec<Workload> = manifests
            .into_iter()
            .filter_map(|manifest| match manifest {
                WorkloadManifest::Workload(workload) => Some(workload),
                WorkloadManifest::ConfigData(_) | WorkloadManifest::SecretData(_) => None,
            })
            .collect();

        let keys: BTreeSet<WorkloadKey> = workloads.iter().map(WorkloadKey::from).collect();
        let count = workloads.len();
        for workload in workloads {
            let namespace = workload.namespace.clone();
            let name = workload.name.clone();
            self.store.update_workload(&namespace, &name, workload);
        }

        let previous = self.file_index.remove(path).unwrap_or_default();
        for dropped in previous.difference(&keys) {
            self.retract(path, dropped);
        }
        if !keys.is_empty() {
            self.file_index.insert(path.to_path_buf(), keys);
        }

        info!("Applied {} workload(s) from {}", count, path.display());
        Ok(count)
    }

    /// Retracts every workload `path` contributed. Returns how many store
    /// entries were removed.
    pub fn remove_manifest_file(
        &mut self,
        path: &Path,
    ) -> usize {
        let Some(keys) = self.file_index.remove(path) else {
            debug!("{} contributed no workloads", path.display());
            return 0;
        };

        let removed = keys.iter().filter(|key| self.retract(path, key)).count();
        info!(
            "Removed {} workload(s) of deleted manifest {}",
            removed,
            path.display()
        );
        removed
    }

    /// Deletes `key` unless a file other than `path` still declares it.
    fn retract(
        &self,
        path: &Path,
        key: &WorkloadKey,
    ) -> bool {
        let elsewhere = self
            .file_index
            .iter()
            .any(|(other, keys)| other != path && keys.contains(key));
        if elsewhere {
            debug!("{} is still declared by another manifest, keeping it", key);
            return false;
        }
        self.store.delete_workload(&key.namespace, &key.name)
    }

    /// Applies every manifest already present in `dirs`, in path order.
    pub fn load_existing(
        &mut self,
        dirs: &[PathBuf],
    ) -> usize {
        let mut paths = Vec::new();
        for dir in dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot scan manifest directory {}: {}", dir.display(), e);
                    continue;
                }
            };
            paths.extend(
                entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| path.is_file() && is_manifest_path(path)),
            );
        }
        paths.sort();

        let mut applied = 0;
        for path in paths {
            self.handle_event(&ManifestEvent::new(ManifestEventType::Added, path));
            applied += 1;
        }
        applied
    }

    /// Lists sandboxes and folds their state into the store.
    ///
    /// Returns what was observed so the caller can plan convergence.
    pub async fn sync_state_from_runtime(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<RuntimeSandbox>, RuntimeError> {
        let observed = self.client.list_pod_sandbox(cancel).await?;
        debug!("runtime reported {} sandbox(es)", observed.len());

        for (key, sandbox) in best_sandboxes(&observed) {
            let Some(state) = self.store.get_workload(&key.namespace, &key.name) else {
                continue;
            };
            let status = status_for(sandbox.state, state.manifest.replicas);
            self.store
                .update_pod_status(&key.namespace, &key.name, &sandbox.id, status);
        }
        Ok(observed)
    }

    /// One reconciliation pass: sync from the runtime, then converge.
    ///
    /// Failures are logged; the next pass retries.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
    ) {
        let observed = match self.sync_state_from_runtime(cancel).await {
            Ok(observed) => observed,
            Err(e) => {
                RUNTIME_SYNC_FAILURES.inc();
                warn!("Runtime sync failed, keeping last known state: {}", e);
                return;
            }
        };

        if self.settings.converge {
            self.converge(&observed, cancel).await;
        }
    }

    async fn converge(
        &self,
        observed: &[RuntimeSandbox],
        cancel: &CancellationToken,
    ) {
        let snapshot: BTreeMap<WorkloadKey, Workload> = self
            .store
            .get_workloads()
            .into_iter()
            .map(|state| (state.key(), state.manifest))
            .collect();
        let desired: BTreeMap<WorkloadKey, u32> = snapshot
            .iter()
            .map(|(key, workload)| (key.clone(), workload.replicas))
            .collect();

        let plan = plan(&desired, observed, self.settings.garbage_collect);
        if plan.is_empty() {
            return;
        }
        debug!(
            "convergence plan: start={}, stop={}",
            plan.start.len(),
            plan.stop.len()
        );

        // Replaced sandboxes are gone before their successors are started.
        for action in &plan.stop {
            if cancel.is_cancelled() {
                return;
            }
            self.stop_sandbox(action, cancel).await;
        }
        for key in &plan.start {
            if cancel.is_cancelled() {
                return;
            }
            if let Some(workload) = snapshot.get(key) {
                self.start_sandbox(key, workload, cancel).await;
            }
        }
    }

    async fn start_sandbox(
        &self,
        key: &WorkloadKey,
        workload: &Workload,
        cancel: &CancellationToken,
    ) {
        if workload.replicas > 1 {
            debug!(
                "{} asks for {} replicas, running a single sandbox",
                key, workload.replicas
            );
        }
        let spec = self.sandbox_spec(workload);
        match self.client.run_pod_sandbox(cancel, spec).await {
            Ok(sandbox_id) => {
                record_sandbox_operation("start", true);
                info!("Started sandbox {} for {}", sandbox_id, key);
            }
            Err(e) => {
                record_sandbox_operation("start", false);
                warn!("Failed to start sandbox for {}: {}", key, e);
            }
        }
    }

    async fn stop_sandbox(
        &self,
        action: &StopAction,
        cancel: &CancellationToken,
    ) {
        if let Err(e) = self.client.stop_pod_sandbox(cancel, &action.sandbox_id).await {
            record_sandbox_operation("stop", false);
            warn!(
                "Failed to stop sandbox {} of {}: {}",
                action.sandbox_id, action.key, e
            );
            return;
        }
        record_sandbox_operation("stop", true);
        info!("Stopped sandbox {} of {}", action.sandbox_id, action.key);

        if !action.remove {
            return;
        }
        match self.client.remove_pod_sandbox(cancel, &action.sandbox_id).await {
            Ok(()) => {
                record_sandbox_operation("remove", true);
                info!("Removed sandbox {} of {}", action.sandbox_id, action.key);
            }
            Err(e) => {
                record_sandbox_operation("remove", false);
                warn!(
                    "Failed to remove sandbox {} of {}: {}",
                    action.sandbox_id, action.key, e
                );
            }
        }
    }

    pub(crate) fn sandbox_spec(
        &self,
        workload: &Workload,
    ) -> SandboxSpec {
        let uid = nanoid::nanoid!();
        let mut labels: HashMap<String, String> = workload
            .template
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.insert(MANAGED_BY_LABEL.to_string(), "true".to_string());

        SandboxSpec {
            name: workload.name.clone(),
            namespace: workload.namespace.clone(),
            log_directory: format!(
                "{}/{}_{}_{}",
                POD_LOG_ROOT, workload.namespace, workload.name, uid
            ),
            uid,
            hostname: workload.name.clone(),
            labels,
            annotations: HashMap::new(),
            runtime_handler: self.settings.runtime_handler.clone(),
        }
    }

    /// Consumes manifest events and reconciles every `sync_interval` until
    /// `cancel` fires.
    ///
    /// The first periodic pass happens one interval after start; callers run
    /// the initial pass themselves. A closed event stream stops event handling
    /// but not the periodic passes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ManifestEvent>,
        cancel: CancellationToken,
    ) {
        let period = self.settings.sync_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        info!("Reconciliation engine started, sync every {:?}", period);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                // Ahead of events so a busy manifest directory cannot starve syncs.
                _ = ticker.tick() => self.reconcile(&cancel).await,
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(&event),
                    None => {
                        info!("Manifest event stream closed, continuing runtime sync only");
                        events_open = false;
                    }
                },
            }
        }
        info!("Reconciliation engine stopped");
    }
}
