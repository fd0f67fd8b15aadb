//! Watch command handler
//!
//! Runs the engine until Ctrl-C. Script changes come from the engine's own
//! watch session; edits to the settings files or the secret store are picked
//! up here and delivered as configuration changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use bbsync_core::watch::DEBOUNCE_MS;
use bbsync_core::{Command, Engine, NotifySource, SyncClient, WatchState};

use super::Workspace;
use crate::output::Output;

/// Watch the workspace and push changes until interrupted
pub async fn run(workspace: &Workspace, output: Arc<Output>) -> Result<()> {
    let raw = workspace.load()?;
    let mut engine = Engine::new(
        &raw,
        workspace.roots.clone(),
        NotifySource::default(),
        SyncClient::new(),
        output.clone(),
    );

    // Already running if the watcher flag was persisted as enabled
    if engine.watch_state() == WatchState::Disabled {
        engine.handle(Command::EnableWatcher).await;
    }
    if engine.watch_state() == WatchState::Disabled {
        output.message(
            "Watcher not started; it is retried on the next configuration or auth token change.",
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let _config_watcher = watch_config(workspace.clone(), tx.clone())?;

    output.message("Press Ctrl-C to stop.");

    let engine_run = engine.run(rx);
    tokio::pin!(engine_run);

    tokio::select! {
        _ = &mut engine_run => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            output.message("Stopping file watcher.");
        }
    }

    Ok(())
}

/// Keeps the settings watcher and its reload task alive
struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn watch_config(
    workspace: Workspace,
    commands: mpsc::UnboundedSender<Command>,
) -> Result<ConfigWatcher> {
    let files = workspace.watched_files();
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();

    // `auth set` from another shell must be seen even on a fresh install
    if let Some(dir) = workspace.secrets.path().parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create {}: {}", dir.display(), e);
        }
    }

    let watched: Vec<PathBuf> = files.iter().map(|file| settings_key(file)).collect();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if touches(&event, &watched) => {
            let _ = changed_tx.send(());
        }
        Ok(_) => {}
        Err(e) => warn!("Config watch error: {}", e),
    })
    .context("Failed to create the configuration watcher")?;

    // Watch the containing directories so files created later are seen too
    let mut dirs: Vec<&Path> = files
        .iter()
        .filter_map(|file| file.parent())
        .filter(|dir| dir.is_dir())
        .collect();
    dirs.sort();
    dirs.dedup();

    for dir in dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
    }

    let task = tokio::spawn(async move {
        while changed_rx.recv().await.is_some() {
            // Editors write settings files in several steps
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            while changed_rx.try_recv().is_ok() {}

            match workspace.load() {
                Ok(raw) => {
                    info!("Configuration changed, refreshing");
                    if commands.send(Command::ConfigChanged(raw)).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring configuration change: {:#}", e),
            }
        }
    });

    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

/// Whether an event concerns one of the settings files.
///
/// `files` must already be passed through [`settings_key`].
fn touches(event: &Event, files: &[PathBuf]) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| files.contains(&settings_key(path)))
}

/// Path with its directory resolved, so `/tmp` and `/private/tmp` or a
/// symlinked config dir compare equal. The file itself may not exist.
fn settings_key(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .unwrap_or_else(|_| parent.to_path_buf())
            .join(name),
        _ => path.to_path_buf(),
    }
}
