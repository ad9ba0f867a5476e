use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::Result;

/// Spawns a named long-running task and logs how it ended.
pub fn spawn_task<Fut>(
    name: &str,
    task: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        match task.await {
            Ok(()) => info!("task {name} finished"),
            Err(e) => error!("task {name} stopped with an error: {:?}", e),
        }
    })
}

/// Awaits every handle; a panicked task is logged, not propagated.
pub async fn join_tasks(handles: Vec<(&'static str, JoinHandle<()>)>) {
    for (name, handle) in handles {
        if let Err(e) = handle.await {
            error!("task {name} did not shut down cleanly: {}", e);
        }
    }
}
