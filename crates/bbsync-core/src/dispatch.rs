//! Command dispatch
//!
//! Maps every host event or command onto a pure handler. Handlers look at
//! the current [`SyncConfig`] and the payload and return the [`Action`]s to
//! perform; all I/O happens in the engine that executes them.

use std::path::PathBuf;

use crate::config::RawHostConfig;
use crate::error::SyncError;
use crate::notification::Notification;
use crate::remote::SyncKind;
use crate::settings::{Resolution, SyncConfig, WatcherDirective};
use crate::watch::{WatchNotification, WatchState};

/// Everything the host can ask the engine to do
#[derive(Debug, Clone)]
pub enum Command {
    EnableWatcher,
    DisableWatcher,
    /// Push one file (UPSERT)
    PushFile(PathBuf),
    /// Push every syncable file under the script root
    PushAll,
    /// Delete one file from the game
    DeleteFile(PathBuf),
    /// Host configuration changed
    ConfigChanged(RawHostConfig),
    /// The watch session saw a change
    Watch(WatchNotification),
}

impl Command {
    /// Stable identifier, used in logs
    pub fn id(&self) -> &'static str {
        match self {
            Command::EnableWatcher => "enable-watcher",
            Command::DisableWatcher => "disable-watcher",
            Command::PushFile(_) => "push-file",
            Command::PushAll => "push-all",
            Command::DeleteFile(_) => "delete-file",
            Command::ConfigChanged(_) => "config-changed",
            Command::Watch(_) => "watch-notification",
        }
    }
}

/// A unit of work for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read the file and send it
    Push {
        kind: SyncKind,
        path: PathBuf,
        force_show: bool,
    },
    /// Delete the file remotely
    Delete { path: PathBuf, force_show: bool },
    /// List the script root and push every syncable file
    PushTree,
    /// Create a session, replacing any live one
    StartWatch,
    /// Tear down the live session
    StopWatch,
    Notify(Notification),
}

fn error(err: SyncError) -> Action {
    Action::Notify(Notification {
        level: err.level(),
        message: err.to_string(),
    })
}

/// Explicit "enable watcher" command
pub fn enable_watcher(config: &SyncConfig) -> Vec<Action> {
    if !config.has_token() {
        return vec![error(SyncError::AuthNotConfigured)];
    }
    vec![Action::StartWatch]
}

/// Explicit "disable watcher" command
pub fn disable_watcher(state: WatchState) -> Vec<Action> {
    let mut actions = Vec::new();
    if state == WatchState::Enabled {
        actions.push(Action::StopWatch);
    }
    actions.push(Action::Notify(Notification::info("File Watcher Disabled")));
    actions
}

/// Manual push of a single file
pub fn push_file(config: &SyncConfig, path: PathBuf) -> Vec<Action> {
    match check_manual_target(config, &path) {
        Some(err) => vec![error(err)],
        None => vec![Action::Push {
            kind: SyncKind::Upsert,
            path,
            force_show: true,
        }],
    }
}

/// Manual delete of a single file
pub fn delete_file(config: &SyncConfig, path: PathBuf) -> Vec<Action> {
    match check_manual_target(config, &path) {
        Some(err) => vec![error(err)],
        None => vec![Action::Delete {
            path,
            force_show: true,
        }],
    }
}

/// Manual push of the whole script root
pub fn push_all(config: &SyncConfig) -> Vec<Action> {
    if !config.has_token() {
        return vec![error(SyncError::AuthNotConfigured)];
    }
    vec![Action::PushTree]
}

/// One file found while pushing the whole tree
pub fn push_listed_file(config: &SyncConfig, path: PathBuf) -> Option<Action> {
    config.classifier.is_syncable(&path).then_some(Action::Push {
        kind: SyncKind::Upsert,
        path,
        force_show: false,
    })
}

/// A notification from the live watch session
pub fn watch_notification(config: &SyncConfig, notification: WatchNotification) -> Vec<Action> {
    if !config.classifier.is_syncable(&notification.path) {
        return Vec::new();
    }

    let action = match notification.kind.sync_kind() {
        SyncKind::Delete => Action::Delete {
            path: notification.path,
            force_show: false,
        },
        kind => Action::Push {
            kind,
            path: notification.path,
            force_show: false,
        },
    };
    vec![action]
}

/// A configuration refresh, given the watcher state before it
///
/// A live session is always torn down and, unless the refresh turned the
/// watcher off, recreated against the new config. `requested` is whether
/// watching was asked for (enable command or persisted flag) and not
/// withdrawn since; a refresh that leaves the flag alone then retries a
/// watcher that could not start, e.g. once an auth token shows up.
pub fn config_changed(resolution: &Resolution, state: WatchState, requested: bool) -> Vec<Action> {
    let mut actions: Vec<Action> = resolution
        .warnings
        .iter()
        .map(|warning| Action::Notify(Notification::warning(warning.to_string())))
        .collect();

    let was_enabled = state == WatchState::Enabled;
    let want_enabled = match resolution.watcher {
        WatcherDirective::Set(enabled) => enabled,
        WatcherDirective::Unchanged => was_enabled || requested,
    };

    if was_enabled {
        actions.push(Action::StopWatch);
    }
    if want_enabled {
        actions.extend(enable_watcher(&resolution.config));
    }
    actions
}

/// Token and extension checks shared by manual push and delete
fn check_manual_target(config: &SyncConfig, path: &std::path::Path) -> Option<SyncError> {
    if !config.has_token() {
        return Some(SyncError::AuthNotConfigured);
    }
    if !config.classifier.is_syncable(path) {
        return Some(SyncError::InvalidFileType {
            path: path.to_path_buf(),
            extensions: config.classifier.describe(),
        });
    }
    None
}
