use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kubeless::api::bind_status_server;
use kubeless::config::AgentConfig;
use kubeless::constants::LOG_FILE_NAME;
use kubeless::engine::EngineSettings;
use kubeless::engine::ReconciliationEngine;
use kubeless::manifest::ManifestWatcher;
use kubeless::runtime::CriRuntimeClient;
use kubeless::runtime::RuntimeClient;
use kubeless::store::WorkloadStore;
use kubeless::utils::async_task::join_tasks;
use kubeless::utils::async_task::spawn_task;
use kubeless::utils::file_io::open_file_for_append;
use kubeless::Error;
use kubeless::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Converges manifest files with a local CRI runtime.
#[derive(Debug, Parser)]
#[command(name = "kubeless", version, about)]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_config(&cli)?;

    if cli.check {
        println!("configuration OK");
        return Ok(());
    }

    // Initializing Logs
    let _guard = init_observability(settings.log_dir.as_deref())?;

    if let Err(e) = run(settings).await {
        error!("kubeless stopped: {}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let base = AgentConfig::new()?;
    let config = match &cli.config {
        Some(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| Error::InvalidConfig(format!("config path {:?} is not UTF-8", path)))?;
            base.with_override_config(path)?
        }
        None => base,
    };
    config.validate()
}

async fn run(settings: AgentConfig) -> Result<()> {
    let cancel = CancellationToken::new();

    let client = Arc::new(CriRuntimeClient::new(settings.cri_socket_path.clone()));
    client.connect(&cancel).await?;
    match client.version(&cancel).await {
        Ok(version) => info!(
            "CRI runtime {} {} (API {})",
            version.runtime_name, version.runtime_version, version.runtime_api_version
        ),
        Err(e) => warn!("Could not query CRI runtime version: {}", e),
    }

    let store = Arc::new(WorkloadStore::new());

    let (watcher, events) = match ManifestWatcher::new(&settings.manifest_dirs) {
        Ok(built) => built,
        Err(e) => {
            client.close();
            return Err(e.into());
        }
    };

    let mut engine = ReconciliationEngine::new(
        store.clone(),
        client.clone(),
        EngineSettings::from_config(&settings)?,
    );
    let loaded = engine.load_existing(watcher.watched_dirs());
    info!("Loaded {} existing manifest file(s)", loaded);
    engine.reconcile(&cancel).await;

    let status_server = if settings.status.enabled {
        Some(bind_status_server(
            settings.status.socket_addr()?,
            store.clone(),
            cancel.clone(),
        )?)
    } else {
        None
    };

    let mut handles = vec![
        (
            "manifest-watcher",
            spawn_task("manifest-watcher", {
                let cancel = cancel.clone();
                async move {
                    watcher.run(cancel).await;
                    Ok(())
                }
            }),
        ),
        (
            "reconciliation-engine",
            spawn_task("reconciliation-engine", {
                let cancel = cancel.clone();
                async move {
                    engine.run(events, cancel).await;
                    Ok(())
                }
            }),
        ),
    ];
    if let Some((_, server)) = status_server {
        handles.push((
            "status-server",
            spawn_task("status-server", async move {
                server.await;
                Ok(())
            }),
        ));
    }

    info!("Application started. Waiting for shutdown signal...");
    if let Err(e) = graceful_shutdown().await {
        error!("Failed to listen for shutdown signals: {:?}", e);
    }
    cancel.cancel();

    join_tasks(handles).await;
    // Only after the engine is gone, so its last call never sees a closed channel.
    client.close();
    info!("Shutdown completed");
    Ok(())
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}

/// Logs to `<log_dir>/kubeless.log` when a directory is configured, stdout
/// otherwise. `RUST_LOG` selects levels (default `info`).
fn init_observability(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let log_file = open_file_for_append(&dir.join(LOG_FILE_NAME))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(filter());
            tracing_subscriber::registry().with(file_layer).init();
            Ok(Some(guard))
        }
        None => {
            let stdout_layer = tracing_subscriber::fmt::layer().with_filter(filter());
            tracing_subscriber::registry().with(stdout_layer).init();
            Ok(None)
        }
    }
}
