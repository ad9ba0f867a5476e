use std::time::Duration;

use crate::runtime::cri::runtime_service_server::RuntimeService;
use crate::runtime::cri::ListPodSandboxRequest;
use crate::runtime::cri::ListPodSandboxResponse;
use crate::runtime::cri::RemovePodSandboxRequest;
use crate::runtime::cri::RemovePodSandboxResponse;
use crate::runtime::cri::RunPodSandboxRequest;
use crate::runtime::cri::RunPodSandboxResponse;
use crate::runtime::cri::StopPodSandboxRequest;
use crate::runtime::cri::StopPodSandboxResponse;
use crate::runtime::cri::VersionRequest;
use crate::runtime::cri::VersionResponse;

#[derive(Debug, Clone, Default)]
pub struct MockRuntimeService {
    // Expected responses for each method
    pub expected_version_response: Option<Result<VersionResponse, tonic::Status>>,
    pub expected_list_response: Option<Result<ListPodSandboxResponse, tonic::Status>>,
    pub expected_run_response: Option<Result<RunPodSandboxResponse, tonic::Status>>,
    pub expected_stop_response: Option<Result<StopPodSandboxResponse, tonic::Status>>,
    pub expected_remove_response: Option<Result<RemovePodSandboxResponse, tonic::Status>>,
    /// Applied before every answer
    pub delay: Option<Duration>,
}

impl MockRuntimeService {
    async fn respond<T: Clone>(
        &self,
        expected: &Option<Result<T, tonic::Status>>,
        method: &str,
    ) -> std::result::Result<tonic::Response<T>, tonic::Status> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match expected {
            Some(Ok(response)) => Ok(tonic::Response::new(response.clone())),
            Some(Err(status)) => Err(status.clone()),
            None => Err(tonic::Status::unknown(format!("No mock {} response set", method))),
        }
    }
}

#[tonic::async_trait]
impl RuntimeService for MockRuntimeService {
    async fn version(
        &self,
        _request: tonic::Request<VersionRequest>,
    ) -> std::result::Result<tonic::Response<VersionResponse>, tonic::Status> {
        self.respond(&self.expected_version_response, "version").await
    }

    async fn run_pod_sandbox(
        &self,
        _request: tonic::Request<RunPodSandboxRequest>,
    ) -> std::result::Result<tonic::Response<RunPodSandboxResponse>, tonic::Status> {
        self.respond(&self.expected_run_response, "run_pod_sandbox").await
    }

    async fn stop_pod_sandbox(
        &self,
        _request: tonic::Request<StopPodSandboxRequest>,
    ) -> std::result::Result<tonic::Response<StopPodSandboxResponse>, tonic::Status> {
        self.respond(&self.expected_stop_response, "stop_pod_sandbox").await
    }

    async fn remove_pod_sandbox(
        &self,
        _request: tonic::Request<RemovePodSandboxRequest>,
    ) -> std::result::Result<tonic::Response<RemovePodSandboxResponse>, tonic::Status> {
        self.respond(&self.expected_remove_response, "remove_pod_sandbox").await
    }

    async fn list_pod_sandbox(
        &self,
        _request: tonic::Request<ListPodSandboxRequest>,
    ) -> std::result::Result<tonic::Response<ListPodSandboxResponse>, tonic::Status> {
        self.respond(&self.expected_list_response, "list_pod_sandbox").await
    }
}
