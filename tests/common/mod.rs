#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kubeless::runtime::cri;
use kubeless::runtime::cri::runtime_service_server::RuntimeService;
use kubeless::runtime::cri::runtime_service_server::RuntimeServiceServer;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnixListenerStream;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// In-memory CRI runtime that remembers the sandboxes it was asked to run.
#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    sandboxes: Arc<Mutex<Vec<cri::PodSandbox>>>,
    next_id: Arc<Mutex<u64>>,
}

impl FakeRuntime {
    pub fn add_sandbox(
        &self,
        id: &str,
        namespace: &str,
        name: &str,
        state: cri::PodSandboxState,
    ) {
        self.sandboxes.lock().push(cri::PodSandbox {
            id: id.to_string(),
            metadata: Some(cri::PodSandboxMetadata {
                name: name.to_string(),
                uid: format!("uid-{}", id),
                namespace: namespace.to_string(),
                attempt: 0,
            }),
            state: state as i32,
            ..Default::default()
        });
    }

    pub fn sandboxes(&self) -> Vec<cri::PodSandbox> {
        self.sandboxes.lock().clone()
    }

    pub fn sandbox_for(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<cri::PodSandbox> {
        self.sandboxes().into_iter().find(|sb| {
            sb.metadata
                .as_ref()
                .is_some_and(|m| m.namespace == namespace && m.name == name)
        })
    }

    fn set_state(
        &self,
        id: &str,
        state: cri::PodSandboxState,
    ) -> Result<(), tonic::Status> {
        let mut sandboxes = self.sandboxes.lock();
        let sandbox = sandboxes
            .iter_mut()
            .find(|sb| sb.id == id)
            .ok_or_else(|| tonic::Status::not_found(format!("sandbox {} not found", id)))?;
        sandbox.state = state as i32;
        Ok(())
    }
}

#[tonic::async_trait]
impl RuntimeService for FakeRuntime {
    async fn version(
        &self,
        _request: tonic::Request<cri::VersionRequest>,
    ) -> Result<tonic::Response<cri::VersionResponse>, tonic::Status> {
        Ok(tonic::Response::new(cri::VersionResponse {
            version: "0.1.0".to_string(),
            runtime_name: "fake".to_string(),
            runtime_version: "0.0.1".to_string(),
            runtime_api_version: "v1".to_string(),
        }))
    }

    async fn run_pod_sandbox(
        &self,
        request: tonic::Request<cri::RunPodSandboxRequest>,
    ) -> Result<tonic::Response<cri::RunPodSandboxResponse>, tonic::Status> {
        let config = request
            .into_inner()
            .config
            .ok_or_else(|| tonic::Status::invalid_argument("config is required"))?;
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("sb-{}", *next)
        };
        self.sandboxes.lock().push(cri::PodSandbox {
            id: id.clone(),
            metadata: config.metadata,
            state: cri::PodSandboxState::SandboxReady as i32,
            labels: config.labels,
            annotations: config.annotations,
            ..Default::default()
        });
        Ok(tonic::Response::new(cri::RunPodSandboxResponse { pod_sandbox_id: id }))
    }

    async fn stop_pod_sandbox(
        &self,
        request: tonic::Request<cri::StopPodSandboxRequest>,
    ) -> Result<tonic::Response<cri::StopPodSandboxResponse>, tonic::Status> {
        self.set_state(
            &request.into_inner().pod_sandbox_id,
            cri::PodSandboxState::SandboxNotready,
        )?;
        Ok(tonic::Response::new(cri::StopPodSandboxResponse {}))
    }

    async fn remove_pod_sandbox(
        &self,
        request: tonic::Request<cri::RemovePodSandboxRequest>,
    ) -> Result<tonic::Response<cri::RemovePodSandboxResponse>, tonic::Status> {
        let id = request.into_inner().pod_sandbox_id;
        self.sandboxes.lock().retain(|sb| sb.id != id);
        Ok(tonic::Response::new(cri::RemovePodSandboxResponse {}))
    }

    async fn list_pod_sandbox(
        &self,
        _request: tonic::Request<cri::ListPodSandboxRequest>,
    ) -> Result<tonic::Response<cri::ListPodSandboxResponse>, tonic::Status> {
        Ok(tonic::Response::new(cri::ListPodSandboxResponse {
            items: self.sandboxes(),
        }))
    }
}

/// A [`FakeRuntime`] served on a Unix socket until dropped.
pub struct FakeRuntimeServer {
    pub runtime: FakeRuntime,
    pub socket_path: PathBuf,
    _dir: TempDir,
    _shutdown: oneshot::Sender<()>,
}

impl FakeRuntimeServer {
    pub async fn start() -> Self {
        let runtime = FakeRuntime::default();
        let dir = tempfile::tempdir().expect("create socket dir");
        let socket_path = dir.path().join("cri.sock");
        let listener = UnixListener::bind(&socket_path).expect("bind fake runtime socket");
        let (tx, rx) = oneshot::channel();

        let service = runtime.clone();
        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(RuntimeServiceServer::new(service))
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async {
                    rx.await.ok();
                })
                .await
                .expect("fake runtime server failed");
        });

        Self {
            runtime,
            socket_path,
            _dir: dir,
            _shutdown: tx,
        }
    }

    pub fn address(&self) -> String {
        format!("unix://{}", self.socket_path.display())
    }
}

pub fn deployment_yaml(
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

pub fn write_manifest(
    dir: &Path,
    file_name: &str,
    contents: &str,
) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, contents).expect("write manifest");
    path
}

/// Writes through a temporary file and a rename so watchers never observe a
/// half-written manifest.
pub fn replace_manifest(
    dir: &Path,
    file_name: &str,
    contents: &str,
) -> PathBuf {
    let staging = dir.join(format!("{}.tmp", file_name));
    std::fs::write(&staging, contents).expect("write staged manifest");
    let path = dir.join(file_name);
    std::fs::rename(&staging, &path).expect("rename staged manifest");
    path
}

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] passes.
pub async fn wait_for(
    what: &str,
    condition: impl Fn() -> bool,
) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("timed out waiting for {}", what);
}
