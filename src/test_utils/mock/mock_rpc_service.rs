use std::path::PathBuf;

use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnixListenerStream;
use tracing::debug;

use super::MockRuntimeService;
use crate::runtime::cri::runtime_service_server::RuntimeServiceServer;

/// A mock runtime listening on a socket inside its own temporary directory.
///
/// The directory (and so the socket) lives as long as this value.
pub struct MockRuntimeServer {
    _dir: TempDir,
    pub socket_path: PathBuf,
}

impl MockRuntimeServer {
    pub async fn start(
        mock_service: MockRuntimeService,
        rx: oneshot::Receiver<()>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create socket dir");
        let socket_path = dir.path().join("cri.sock");
        let listener = UnixListener::bind(&socket_path).expect("bind mock runtime socket");
        debug!("starting mock runtime service: socket={}", socket_path.display());

        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(RuntimeServiceServer::new(mock_service))
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            _dir: dir,
            socket_path,
        }
    }

    /// Address in the form accepted by the runtime client config.
    pub fn address(&self) -> String {
        format!("unix://{}", self.socket_path.display())
    }
}
