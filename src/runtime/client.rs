use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use hyper_util::rt::TokioIo;
#[cfg(test)]
use mockall::automock;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tonic::transport::Channel;
use tonic::transport::Endpoint;
use tonic::transport::Uri;
use tower::service_fn;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::cri;
use super::cri::runtime_service_client::RuntimeServiceClient;
use super::RuntimeSandbox;
use super::RuntimeVersion;
use super::SandboxSpec;
use crate::constants::CRI_CALL_TIMEOUT;
use crate::constants::CRI_ENDPOINT_PLACEHOLDER;
use crate::constants::UNIX_SCHEME_PREFIX;
use crate::RuntimeError;

/// Operations the agent needs from the container runtime.
///
/// Every call is bounded by a fixed deadline and aborts early when `cancel`
/// fires. No call retries on its own.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeClient: Send + Sync + 'static {
    async fn connect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    async fn list_pod_sandbox(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RuntimeSandbox>, RuntimeError>;

    async fn version(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RuntimeVersion, RuntimeError>;

    /// Returns the id of the new sandbox.
    async fn run_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        spec: SandboxSpec,
    ) -> Result<String, RuntimeError>;

    async fn stop_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        sandbox_id: &str,
    ) -> Result<(), RuntimeError>;

    async fn remove_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        sandbox_id: &str,
    ) -> Result<(), RuntimeError>;

    /// Drops the channel. Safe to call at any time.
    fn close(&self);
}

/// gRPC client for a CRI runtime listening on a Unix socket.
pub struct CriRuntimeClient {
    address: String,
    client: ArcSwapOption<RuntimeServiceClient<Channel>>,
}

impl CriRuntimeClient {
    /// `address` is a socket path, optionally prefixed with `unix://`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            client: ArcSwapOption::empty(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn socket_path(&self) -> PathBuf {
        PathBuf::from(
            self.address
                .strip_prefix(UNIX_SCHEME_PREFIX)
                .unwrap_or(&self.address),
        )
    }

    fn handle(&self) -> Result<RuntimeServiceClient<Channel>, RuntimeError> {
        self.client
            .load_full()
            .map(|client| (*client).clone())
            .ok_or(RuntimeError::NotInitialized)
    }

    fn connection_error(
        &self,
        reason: impl ToString,
    ) -> RuntimeError {
        RuntimeError::Connection {
            address: self.address.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Races one RPC against the call deadline and the caller's token.
async fn guarded<T, F>(
    method: &'static str,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, RuntimeError>
where
    F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
{
    trace!("CRI call {} started", method);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RuntimeError::Cancelled { method }),
        result = tokio::time::timeout(CRI_CALL_TIMEOUT, call) => match result {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(RuntimeError::call(method, status)),
            Err(_) => Err(RuntimeError::Timeout {
                method,
                duration: CRI_CALL_TIMEOUT,
            }),
        },
    }
}

#[async_trait]
impl RuntimeClient for CriRuntimeClient {
    async fn connect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let socket_path = self.socket_path();
        debug!("dialing CRI runtime at {}", socket_path.display());

        // The authority is a placeholder; the connector always dials the socket.
        let endpoint = Endpoint::from_static(CRI_ENDPOINT_PLACEHOLDER);
        let dial = endpoint.connect_with_connector(service_fn(move |_: Uri| {
            let socket_path = socket_path.clone();
            async move {
                let stream = UnixStream::connect(socket_path).await?;
                Ok::<_, std::io::Error>(TokioIo::new(stream))
            }
        }));

        let channel = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled { method: "Connect" }),
            result = tokio::time::timeout(CRI_CALL_TIMEOUT, dial) => match result {
                Ok(Ok(channel)) => channel,
                Ok(Err(e)) => return Err(self.connection_error(e)),
                Err(_) => {
                    return Err(self.connection_error(format!(
                        "timed out after {:?}",
                        CRI_CALL_TIMEOUT
                    )))
                }
            },
        };

        self.client
            .store(Some(Arc::new(RuntimeServiceClient::new(channel))));
        info!("Connected to CRI runtime at {}", self.address);
        Ok(())
    }

    async fn list_pod_sandbox(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RuntimeSandbox>, RuntimeError> {
        let mut client = self.handle()?;
        let response = guarded(
            "ListPodSandbox",
            cancel,
            client.list_pod_sandbox(cri::ListPodSandboxRequest { filter: None }),
        )
        .await?;

        Ok(response.items.into_iter().map(RuntimeSandbox::from).collect())
    }

    async fn version(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RuntimeVersion, RuntimeError> {
        let mut client = self.handle()?;
        let response = guarded(
            "Version",
            cancel,
            client.version(cri::VersionRequest {
                version: String::new(),
            }),
        )
        .await?;

        Ok(RuntimeVersion::from(response))
    }

    async fn run_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        spec: SandboxSpec,
    ) -> Result<String, RuntimeError> {
        let mut client = self.handle()?;
        let response = guarded(
            "RunPodSandbox",
            cancel,
            client.run_pod_sandbox(spec.into_request()),
        )
        .await?;

        Ok(response.pod_sandbox_id)
    }

    async fn stop_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        sandbox_id: &str,
    ) -> Result<(), RuntimeError> {
        let mut client = self.handle()?;
        guarded(
            "StopPodSandbox",
            cancel,
            client.stop_pod_sandbox(cri::StopPodSandboxRequest {
                pod_sandbox_id: sandbox_id.to_string(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn remove_pod_sandbox(
        &self,
        cancel: &CancellationToken,
        sandbox_id: &str,
    ) -> Result<(), RuntimeError> {
        let mut client = self.handle()?;
        guarded(
            "RemovePodSandbox",
            cancel,
            client.remove_pod_sandbox(cri::RemovePodSandboxRequest {
                pod_sandbox_id: sandbox_id.to_string(),
            }),
        )
        .await?;
        Ok(())
    }

    fn close(&self) {
        if self.client.swap(None).is_some() {
            info!("Closed CRI runtime connection");
        }
    }
}
