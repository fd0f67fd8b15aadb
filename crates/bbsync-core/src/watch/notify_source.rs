//! Watch source backed by the `notify` crate
//!
//! Raw notify events are mapped onto create/change/delete and debounced
//! per (kind, path): editors often emit several writes for one save.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::source::{Subscription, WatchEventKind, WatchNotification, WatchSource, WatchSpec};
use crate::classify::FileClassifier;
use crate::error::{SyncError, SyncResult};

/// Default debounce window for every event kind (100ms)
pub const DEBOUNCE_MS: u64 = 100;

/// Recursive watcher over the script root of every workspace root
#[derive(Debug, Clone)]
pub struct NotifySource {
    debounce: Duration,
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEBOUNCE_MS))
    }
}

impl NotifySource {
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }
}

/// Keeps the watcher and its debounce task alive
struct NotifyGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        // Stop forwarding before the watcher itself is torn down
        self.task.abort();
    }
}

impl WatchSource for NotifySource {
    fn subscribe(
        &mut self,
        spec: &WatchSpec,
        tx: mpsc::UnboundedSender<WatchNotification>,
    ) -> SyncResult<Subscription> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Result<Event, notify::Error>>();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| SyncError::Watch {
            path: spec.directories.first().cloned().unwrap_or_default(),
            message: e.to_string(),
        })?;

        let mut watched = 0;
        for dir in &spec.directories {
            if !dir.is_dir() {
                warn!("Script root {:?} does not exist, not watching it", dir);
                continue;
            }
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(|e| SyncError::Watch {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
            watched += 1;
        }

        if watched == 0 {
            return Err(SyncError::Watch {
                path: spec.directories.first().cloned().unwrap_or_default(),
                message: "none of the script root directories exist".to_string(),
            });
        }

        info!("Watching {} (session {})", spec.globs.join(", "), spec.session);

        let task = tokio::spawn(debounce_loop(
            raw_rx,
            tx,
            spec.session,
            spec.classifier.clone(),
            self.debounce,
        ));

        Ok(Subscription::new(
            spec.session,
            NotifyGuard {
                _watcher: watcher,
                task,
            },
        ))
    }
}

async fn debounce_loop(
    mut raw_rx: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
    tx: mpsc::UnboundedSender<WatchNotification>,
    session: u64,
    classifier: FileClassifier,
    window: Duration,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        tokio::select! {
            res = raw_rx.recv() => {
                match res {
                    Some(Ok(event)) => {
                        let now = Instant::now();
                        for (kind, path) in map_event(&event) {
                            if classifier.is_syncable(&path) {
                                debouncer.push(kind, path, now);
                            }
                        }
                    }
                    Some(Err(e)) => warn!("File watcher error: {}", e),
                    None => break,
                }
            }
            _ = async {
                match debouncer.next_deadline() {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                for (kind, path) in debouncer.take_due(Instant::now()) {
                    debug!("{:?} {:?}", kind, path);
                    let notification = WatchNotification { session, kind, path };
                    if tx.send(notification).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Map a raw notify event onto create/change/delete notifications
pub fn map_event(event: &Event) -> Vec<(WatchEventKind, PathBuf)> {
    let all = |kind: WatchEventKind| -> Vec<(WatchEventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match event.kind {
        EventKind::Create(_) => all(WatchEventKind::Created),
        EventKind::Remove(_) => all(WatchEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(WatchEventKind::Deleted),
            RenameMode::To => all(WatchEventKind::Created),
            RenameMode::Both => {
                let mut mapped = Vec::new();
                if let Some(from) = event.paths.first() {
                    mapped.push((WatchEventKind::Deleted, from.clone()));
                }
                if let Some(to) = event.paths.get(1) {
                    mapped.push((WatchEventKind::Created, to.clone()));
                }
                mapped
            }
            // Platform could not tell the direction
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        WatchEventKind::Created
                    } else {
                        WatchEventKind::Deleted
                    };
                    (kind, p.clone())
                })
                .collect(),
        },
        // Metadata-only changes (permissions, timestamps) don't touch contents
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => all(WatchEventKind::Changed),
        _ => Vec::new(),
    }
}

/// Collapses repeated (kind, path) events inside a quiet window
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<(WatchEventKind, PathBuf), Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record an event, restarting its window
    pub fn push(&mut self, kind: WatchEventKind, path: PathBuf, now: Instant) {
        self.pending.insert((kind, path), now + self.window);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every event whose window has passed, oldest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(WatchEventKind, PathBuf)> {
        let mut due: Vec<((WatchEventKind, PathBuf), Instant)> = Vec::new();
        self.pending.retain(|key, deadline| {
            if *deadline <= now {
                due.push((key.clone(), *deadline));
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        due.into_iter().map(|(key, _)| key).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
