//! Filesystem watcher producing [`ManifestEvent`]s for `*.yaml` / `*.yml` files.
//!
//! The OS backend thread hands raw notifications to the watcher task through a
//! bounded channel using a blocking send, and the watcher task awaits capacity
//! on the bounded output queue. A slow consumer therefore stalls notification
//! processing instead of dropping events.

use std::path::Path;
use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::event::RenameMode;
use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ManifestEvent;
use super::ManifestEventType;
use crate::constants::MANIFEST_EVENT_QUEUE_CAPACITY;
use crate::constants::MANIFEST_EXTENSIONS;
use crate::constants::RAW_NOTIFY_QUEUE_CAPACITY;
use crate::WatchError;

pub struct ManifestWatcher {
    raw_rx: mpsc::Receiver<notify::Result<Event>>,
    events_tx: mpsc::Sender<ManifestEvent>,
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl ManifestWatcher {
    /// Watches every directory in `dirs` and returns the watcher together with
    /// the receiving end of its event queue.
    ///
    /// Missing directories are skipped with a warning. A directory that exists
    /// but cannot be watched aborts construction; watches added so far are
    /// released when the backend handle is dropped on that path.
    pub fn new(dirs: &[PathBuf]) -> Result<(Self, mpsc::Receiver<ManifestEvent>), WatchError> {
        let (raw_tx, raw_rx) = mpsc::channel(RAW_NOTIFY_QUEUE_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Runs on the backend thread, never inside the async runtime.
            if raw_tx.blocking_send(res).is_err() {
                trace!("manifest watcher task is gone, dropping notification");
            }
        })
        .map_err(WatchError::Backend)?;

        let mut watched = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !dir.exists() {
                warn!(
                    "Manifest directory does not exist, skipping: {}",
                    dir.display()
                );
                continue;
            }

            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Setup {
                    path: dir.clone(),
                    source,
                })?;
            info!("Watching directory: {}", dir.display());
            watched.push(dir.clone());
        }

        let (events_tx, events_rx) = mpsc::channel(MANIFEST_EVENT_QUEUE_CAPACITY);
        Ok((
            Self {
                raw_rx,
                events_tx,
                watcher,
                watched,
            },
            events_rx,
        ))
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Runs until `cancel` fires, then releases the OS watches and closes the
    /// event queue.
    pub async fn run(
        self,
        cancel: CancellationToken,
    ) {
        let ManifestWatcher {
            mut raw_rx,
            events_tx,
            watcher,
            watched: _,
        } = self;

        info!("Manifest watcher started");

        'outer: loop {
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                raw = raw_rx.recv() => raw,
            };

            let event = match raw {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!("Watcher error: {}", e);
                    continue;
                }
                None => break,
            };

            for manifest_event in translate(&event) {
                debug!(
                    "manifest event: type={}, file={}",
                    manifest_event.event_type,
                    manifest_event.file_path.display()
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'outer,
                    sent = events_tx.send(manifest_event) => {
                        if sent.is_err() {
                            warn!("manifest event consumer dropped, stopping watcher");
                            break 'outer;
                        }
                    }
                }
            }
        }

        info!("Stopping manifest watcher");
        // Unblocks a backend thread parked on a full raw queue before the
        // handle is released.
        drop(raw_rx);
        drop(watcher);
        drop(events_tx);
    }
}

/// Maps one backend notification to zero or more manifest events.
pub(crate) fn translate(event: &Event) -> Vec<ManifestEvent> {
    let typed: Vec<(ManifestEventType, &PathBuf)> = match &event.kind {
        EventKind::Create(_) => tag_all(ManifestEventType::Added, &event.paths),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            tag_all(ManifestEventType::Deleted, &event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            tag_all(ManifestEventType::Added, &event.paths)
        }
        // The backend reports each half of a rename on its own as well.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => tag_all(ManifestEventType::Deleted, &event.paths),
        EventKind::Modify(_) => tag_all(ManifestEventType::Modified, &event.paths),
        EventKind::Remove(_) => tag_all(ManifestEventType::Deleted, &event.paths),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    };

    typed
        .into_iter()
        .filter(|(_, path)| is_manifest_path(path))
        .map(|(event_type, path)| ManifestEvent::new(event_type, path.clone()))
        .collect()
}

fn tag_all(
    event_type: ManifestEventType,
    paths: &[PathBuf],
) -> Vec<(ManifestEventType, &PathBuf)> {
    paths.iter().map(|p| (event_type, p)).collect()
}

pub(crate) fn is_manifest_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MANIFEST_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
